use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

use super::transport::basic_authorization;
use super::{
    Authentication, HttpTransport, PARAM_BETA_ALLOWED, PARAM_KERNEL_VERSION, PluginDescriptor,
    PluginError, PluginRepositoryListener, PluginRepositoryLoader, RepositoryInfo,
    RepositoryTransport, Result, Version, parse_plugin_idents, select_idents,
};

fn plugin_xml(entries: &[(&str, &str, &str)]) -> String {
    let plugins: String = entries
        .iter()
        .map(|(class_name, version, kernel)| {
            format!(
                "<plugin><classname>{class_name}</classname><version>{version}</version>\
                 <required_kernel_version>{kernel}</required_kernel_version>\
                 <name>{class_name}</name><url>http://host/{class_name}.jar</url></plugin>"
            )
        })
        .collect();
    format!("<repository><plugins>{plugins}</plugins></repository>")
}

#[test]
fn version_parses_short_and_beta_forms() {
    assert_eq!("1.2".parse::<Version>().expect("version"), Version::new(1, 2, 0, 0));
    assert_eq!(
        "2.0.1.4b".parse::<Version>().expect("version"),
        Version::new(2, 0, 1, 4).beta()
    );
    assert_eq!(
        "1.0-beta".parse::<Version>().expect("version"),
        Version::new(1, 0, 0, 0).beta()
    );
    assert!("".parse::<Version>().expect("version").is_empty());
    assert!(matches!(
        "1.x".parse::<Version>(),
        Err(PluginError::InvalidVersion(_))
    ));
    assert!("1.2.3.4.5".parse::<Version>().is_err());
    assert_eq!(Version::new(1, 4, 0, 2).beta().to_string(), "1.4.0.2b");
}

#[test]
fn beta_is_older_than_release_with_same_numbers() {
    let release = Version::new(1, 2, 0, 0);
    assert!(release.beta() < release);
    assert!(release < Version::new(1, 2, 0, 1).beta());
    assert!(Version::new(1, 10, 0, 0) > Version::new(1, 9, 9, 9));
}

#[test]
fn parse_skips_nameless_and_unreadable_entries() {
    let xml = plugin_xml(&[
        ("plugins.a.A", "1.0", "1.0"),
        ("", "1.0", "1.0"),
        ("plugins.b.B", "not a version", "1.0"),
    ]);
    let idents = parse_plugin_idents(&xml, "memory").expect("parse");
    assert_eq!(idents.len(), 1);
    assert_eq!(idents[0].class_name(), "plugins.a.A");
    assert_eq!(idents[0].url, "http://host/plugins.a.A.jar");

    assert!(matches!(
        parse_plugin_idents("<repository><plugins>", "memory"),
        Err(PluginError::Malformed { .. })
    ));
}

#[test]
fn selection_keeps_newest_compatible_version() {
    let xml = plugin_xml(&[
        ("plugins.a.A", "1.0", "1.0"),
        ("plugins.a.A", "1.2", "1.0"),
        ("plugins.a.A", "1.1", "1.0"),
        ("plugins.a.A", "2.0", "9.0"),
        ("plugins.b.B", "3.0b", "1.0"),
    ]);
    let idents = parse_plugin_idents(&xml, "memory").expect("parse");
    let kernel = Version::new(2, 0, 0, 0);

    let stable = select_idents(idents.clone(), &kernel, false);
    assert_eq!(stable.len(), 1);
    assert_eq!(stable[0].ident.version, Version::new(1, 2, 0, 0));

    let with_beta = select_idents(idents, &kernel, true);
    assert_eq!(with_beta.len(), 2);
    assert!(with_beta[1].ident.version.beta);
}

#[test]
fn descriptor_json_omits_repository_credentials() {
    let xml = plugin_xml(&[("plugins.a.A", "1.0", "1.0")]);
    let ident = parse_plugin_idents(&xml, "memory").expect("parse").remove(0);
    let mut repository = RepositoryInfo::new("private", "https://host/repo.xml");
    repository.authentication = Some(Authentication {
        login: "user".to_string(),
        password: "secret".to_string(),
    });

    let json = serde_json::to_string(&PluginDescriptor::new(ident, repository.clone()))
        .expect("serialize");
    assert!(json.contains("https://host/repo.xml"));
    assert!(!json.contains("secret"));

    let saved = serde_json::to_string(&repository).expect("serialize repository");
    assert!(saved.contains("secret"));
}

#[test]
fn login_with_url_characters_goes_in_the_authorization_header() {
    let mut repository = RepositoryInfo::new("private", "https://host/repo.xml");
    assert_eq!(basic_authorization(&repository), None);

    repository.authentication = Some(Authentication {
        login: "user".to_string(),
        password: "p@ss/w:rd#1".to_string(),
    });
    let header = basic_authorization(&repository).expect("header");
    let encoded = header.strip_prefix("Basic ").expect("basic scheme");
    let decoded = BASE64_STANDARD.decode(encoded).expect("base64");
    assert_eq!(decoded, b"user:p@ss/w:rd#1");
    assert_eq!(repository.location, "https://host/repo.xml");

    repository.authentication = Some(Authentication {
        login: String::new(),
        password: "ignored".to_string(),
    });
    assert_eq!(basic_authorization(&repository), None);
}

#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    opened: Condvar,
    entered: Mutex<usize>,
    entered_changed: Condvar,
}

impl Gate {
    fn pass(&self) {
        *self.entered.lock().expect("entered") += 1;
        self.entered_changed.notify_all();
        let mut open = self.open.lock().expect("gate");
        while !*open {
            open = self.opened.wait(open).expect("gate");
        }
    }

    fn wait_entered(&self, count: usize) {
        let mut entered = self.entered.lock().expect("entered");
        while *entered < count {
            entered = self.entered_changed.wait(entered).expect("entered");
        }
    }

    fn open(&self) {
        *self.open.lock().expect("gate") = true;
        self.opened.notify_all();
    }
}

enum Reply {
    Document(String),
    Unreachable,
    Broken,
}

/// Serves canned replies keyed by location.
struct MockTransport {
    documents: Vec<(String, Reply)>,
    gate: Option<Arc<Gate>>,
    calls: AtomicUsize,
    params: Mutex<Vec<Vec<(String, String)>>>,
}

impl MockTransport {
    fn new(documents: Vec<(String, Reply)>) -> Self {
        Self {
            documents,
            gate: None,
            calls: AtomicUsize::new(0),
            params: Mutex::new(Vec::new()),
        }
    }
}

impl RepositoryTransport for MockTransport {
    fn fetch(&self, repository: &RepositoryInfo, params: &[(&str, String)]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.params.lock().expect("params").push(
            params
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect(),
        );
        if let Some(gate) = &self.gate {
            gate.pass();
        }
        match self
            .documents
            .iter()
            .find(|(location, _)| *location == repository.location)
        {
            Some((_, Reply::Document(document))) => Ok(document.clone()),
            Some((location, Reply::Broken)) => {
                Err(PluginError::Transport(format!("{location}: reset")))
            }
            Some((_, Reply::Unreachable)) | None => Err(PluginError::Unreachable {
                location: repository.location.clone(),
                reason: "unknown".to_string(),
            }),
        }
    }
}

#[derive(Default)]
struct CountingListener {
    notifications: AtomicUsize,
}

impl PluginRepositoryListener for CountingListener {
    fn repository_loader_changed(&self, plugin: Option<&PluginDescriptor>) {
        assert!(plugin.is_none());
        self.notifications.fetch_add(1, Ordering::SeqCst);
    }
}

fn loader_for(
    repositories: Vec<RepositoryInfo>,
    transport: Arc<MockTransport>,
) -> Arc<PluginRepositoryLoader> {
    PluginRepositoryLoader::new(
        Arc::new(repositories),
        transport,
        Version::new(2, 0, 0, 0),
        false,
    )
}

#[test]
fn merges_repositories_sorted_by_class_name() {
    let transport = Arc::new(MockTransport::new(vec![
        (
            "http://one".to_string(),
            Reply::Document(plugin_xml(&[("plugins.z.Z", "1.0", "1.0")])),
        ),
        (
            "http://two".to_string(),
            Reply::Document(plugin_xml(&[("plugins.a.A", "1.0", "1.0"), ("plugins.z.Z", "1.1", "1.0")])),
        ),
    ]));
    let mut disabled = RepositoryInfo::new("off", "http://off");
    disabled.enabled = false;
    let mut one = RepositoryInfo::new("one", "http://one");
    one.support_param = true;
    let two = RepositoryInfo::new("two", "http://two");
    let loader = loader_for(vec![one.clone(), disabled, two.clone()], Arc::clone(&transport));

    let listener = Arc::new(CountingListener::default());
    let weak: Weak<dyn PluginRepositoryListener> = Arc::downgrade(&listener) as _;
    loader.add_listener(weak);
    loader.reload();
    loader.wait_loaded();

    assert!(!loader.failed());
    let names: Vec<_> = loader
        .plugins()
        .iter()
        .map(|plugin| plugin.class_name().to_string())
        .collect();
    assert_eq!(names, ["plugins.a.A", "plugins.z.Z", "plugins.z.Z"]);
    assert_eq!(loader.plugins_named("plugins.z.Z").len(), 2);
    assert_eq!(loader.plugins_from(&one).len(), 1);
    assert_eq!(
        loader.plugin("plugins.a.A").map(|plugin| plugin.repository().name.clone()),
        Some("two".to_string())
    );
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    assert_eq!(listener.notifications.load(Ordering::SeqCst), 1);

    let params = transport.params.lock().expect("params");
    assert_eq!(
        params[0],
        [
            (PARAM_KERNEL_VERSION.to_string(), "2.0.0.0".to_string()),
            (PARAM_BETA_ALLOWED.to_string(), "false".to_string()),
        ]
    );
    assert!(params[1].is_empty());
}

#[test]
fn unreachable_and_malformed_repositories_are_skipped() {
    let transport = Arc::new(MockTransport::new(vec![
        (
            "http://down".to_string(),
            Reply::Unreachable,
        ),
        ("http://junk".to_string(), Reply::Document("<repository><plugins>".to_string())),
        (
            "http://up".to_string(),
            Reply::Document(plugin_xml(&[("plugins.a.A", "1.0", "1.0")])),
        ),
    ]));
    let loader = loader_for(
        vec![
            RepositoryInfo::new("down", "http://down"),
            RepositoryInfo::new("junk", "http://junk"),
            RepositoryInfo::new("up", "http://up"),
        ],
        transport,
    );
    loader.reload();
    loader.wait_loaded();

    assert!(!loader.failed());
    assert_eq!(loader.plugins().len(), 1);
}

#[test]
fn transport_failure_fails_the_load_without_publishing() {
    let transport = Arc::new(MockTransport::new(vec![
        (
            "http://up".to_string(),
            Reply::Document(plugin_xml(&[("plugins.a.A", "1.0", "1.0")])),
        ),
        (
            "http://broken".to_string(),
            Reply::Broken,
        ),
    ]));
    let loader = loader_for(
        vec![
            RepositoryInfo::new("up", "http://up"),
            RepositoryInfo::new("broken", "http://broken"),
        ],
        transport,
    );
    let listener = Arc::new(CountingListener::default());
    let weak: Weak<dyn PluginRepositoryListener> = Arc::downgrade(&listener) as _;
    loader.add_listener(weak);
    loader.reload();
    loader.wait_loaded();

    assert!(loader.failed());
    assert!(loader.is_loaded());
    assert!(loader.plugins().is_empty());
    assert_eq!(listener.notifications.load(Ordering::SeqCst), 0);
}

#[test]
fn reload_during_load_supersedes_the_running_cycle() {
    let gate = Arc::new(Gate::default());
    let mut transport = MockTransport::new(vec![(
        "http://slow".to_string(),
        Reply::Document(plugin_xml(&[("plugins.a.A", "1.0", "1.0")])),
    )]);
    transport.gate = Some(Arc::clone(&gate));
    let transport = Arc::new(transport);
    let loader = loader_for(
        vec![RepositoryInfo::new("slow", "http://slow")],
        Arc::clone(&transport),
    );
    let listener = Arc::new(CountingListener::default());
    let weak: Weak<dyn PluginRepositoryListener> = Arc::downgrade(&listener) as _;
    loader.add_listener(weak);

    loader.reload();
    gate.wait_entered(1);
    assert!(loader.is_loading());
    loader.reload();
    loader.reload();
    loader.reload();
    gate.open();
    loader.wait_loaded();
    while loader.is_loading() {
        std::thread::yield_now();
    }

    // the running cycle is abandoned and the three requests collapse into one
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    assert_eq!(listener.notifications.load(Ordering::SeqCst), 1);
    assert_eq!(loader.plugins().len(), 1);
}

#[test]
fn http_transport_reads_local_repositories() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("plugins.xml");
    fs::write(&path, plugin_xml(&[("plugins.a.A", "1.0", "1.0")])).expect("write");

    let transport = HttpTransport::new();
    let local = RepositoryInfo::new("local", format!("file://{}", path.display()));
    let document = transport.fetch(&local, &[]).expect("fetch");
    assert_eq!(
        parse_plugin_idents(&document, &local.location)
            .expect("parse")
            .len(),
        1
    );

    let missing = RepositoryInfo::new("missing", dir.path().join("nope.xml").display().to_string());
    let error = transport.fetch(&missing, &[]).expect_err("missing file");
    assert!(error.skips_repository());
}
