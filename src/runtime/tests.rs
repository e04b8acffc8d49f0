use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use super::{
    AppContext, AppError, IdGenerator, REDACTED, Settings, SingleProcessor, load_settings,
    save_settings,
};
use crate::plugin::{Authentication, RepositoryInfo};
use crate::sequence::Sequence;

#[test]
fn ids_are_unique_across_threads() {
    let ids = Arc::new(IdGenerator::new());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ids = Arc::clone(&ids);
            thread::spawn(move || (0..250).map(|_| ids.next_id()).collect::<Vec<_>>())
        })
        .collect();
    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().expect("worker") {
            assert!(id >= 1);
            assert!(seen.insert(id));
        }
    }
    assert_eq!(seen.len(), 1000);
}

#[test]
fn sequences_of_one_context_get_distinct_ids() {
    let ctx = AppContext::new();
    let first = Sequence::new(&ctx);
    let second = Sequence::new(&ctx);
    assert_ne!(first.id(), second.id());
    assert_ne!(first.name(), second.name());
}

#[test]
fn single_processor_keeps_only_the_latest_waiting_task() {
    let processor = SingleProcessor::new("test-processor");
    let started = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let ran = Arc::new(Mutex::new(Vec::new()));

    {
        let (started, release, ran) = (started.clone(), release.clone(), ran.clone());
        assert!(processor.submit(move || {
            started.wait();
            release.wait();
            ran.lock().expect("ran").push(0);
        }));
    }
    started.wait();
    for index in 1..=3 {
        let ran = ran.clone();
        assert!(processor.submit(move || ran.lock().expect("ran").push(index)));
    }
    assert!(processor.has_waiting_tasks());
    assert!(processor.is_processing());
    release.wait();
    processor.wait_all();

    assert_eq!(*ran.lock().expect("ran"), [0, 3]);
    assert!(!processor.is_processing());
    assert!(!processor.has_waiting_tasks());
}

#[test]
fn single_processor_survives_a_panicking_task() {
    let processor = SingleProcessor::new("panicking");
    let count = Arc::new(AtomicUsize::new(0));
    processor.submit(|| panic!("task failure"));
    processor.wait_all();

    let counter = count.clone();
    processor.submit(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    processor.wait_all();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

fn sample_settings() -> Settings {
    let mut repository = RepositoryInfo::new("default", "https://plugins.example.org/list");
    repository.support_param = true;
    Settings {
        history_size: 10,
        allow_beta: true,
        repositories: vec![repository],
        ..Settings::default()
    }
}

#[test]
fn settings_round_trip_through_yaml_and_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = sample_settings();
    for file in ["settings.yaml", "settings.json"] {
        let path = dir.path().join(file);
        save_settings(&path, &settings).expect("save");
        assert_eq!(load_settings(&path).expect("load"), settings);
    }
}

#[test]
fn displayed_settings_mask_passwords_but_saved_ones_keep_them() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut settings = sample_settings();
    settings.repositories[0].authentication = Some(Authentication {
        login: "user".to_string(),
        password: "secret".to_string(),
    });

    let shown = serde_json::to_string(&settings.redacted()).expect("serialize");
    assert!(shown.contains("user"));
    assert!(shown.contains(REDACTED));
    assert!(!shown.contains("secret"));

    let path = dir.path().join("settings.json");
    save_settings(&path, &settings).expect("save");
    assert_eq!(load_settings(&path).expect("load"), settings);
}

#[test]
fn partial_settings_fall_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("settings.yml");
    std::fs::write(&path, "history_size: 3\nrepositories:\n  - name: local\n    location: /tmp/plugins.xml\n")
        .expect("write");

    let settings = load_settings(&path).expect("load");
    assert_eq!(settings.history_size, 3);
    assert!(settings.auto_update_channel_bounds);
    assert!(settings.repositories[0].enabled);
    assert!(!settings.repositories[0].support_param);
}

#[test]
fn invalid_settings_are_rejected() {
    let settings = Settings {
        sequence_persistence: true,
        ..Settings::default()
    };
    assert!(matches!(settings.validate(), Err(AppError::Config(_))));

    let settings = Settings {
        kernel_version: " ".to_string(),
        ..Settings::default()
    };
    assert!(matches!(AppContext::with_settings(settings), Err(AppError::Config(_))));

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").expect("write");
    assert!(matches!(load_settings(&path), Err(AppError::SerdeJson(_))));
}

#[test]
fn context_enables_persistence_from_settings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = Settings {
        sequence_persistence: true,
        persistence_dir: Some(dir.path().join("metadata")),
        history_size: 4,
        ..Settings::default()
    };
    let ctx = AppContext::with_settings(settings).expect("context");
    assert!(ctx.persistence().is_some());
    assert!(dir.path().join("metadata").is_dir());
    assert_eq!(ctx.settings().history_size, 4);

    let sequence = Sequence::new(&ctx);
    assert!(sequence.is_persistence_enabled());
    assert!(sequence.save_metadata());
}

#[test]
fn kernel_version_is_parsed_from_settings() {
    let settings = Settings {
        kernel_version: "2.5.1".to_string(),
        ..Settings::default()
    };
    let ctx = AppContext::with_settings(settings).expect("context");
    assert_eq!(
        ctx.kernel_version().expect("version").to_string(),
        "2.5.1.0"
    );

    let settings = Settings {
        kernel_version: "two".to_string(),
        ..Settings::default()
    };
    let ctx = AppContext::with_settings(settings).expect("context");
    assert!(matches!(ctx.kernel_version(), Err(AppError::Plugin(_))));
}
