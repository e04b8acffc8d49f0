use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::updater::Collapsible;
use super::{
    ChannelBoundsState, ImageProvider, JsonFilePersistence, META_VIRTUAL, Overlay, Plane, Result,
    Roi, Sequence, SequenceError, SequenceEvent, SequenceEventSource, SequenceEventType,
    SequenceListener, SequenceModelListener, VolumetricImage,
};
use crate::model::{CoreError, DataType, PlaneData};
use crate::runtime::AppContext;

fn u8_plane(width: usize, height: usize, values: Vec<u8>) -> Plane {
    Plane::from_channels(width, height, vec![values]).expect("plane")
}

fn two_channel_plane() -> Plane {
    Plane::from_channels(2, 2, vec![vec![1_u16, 2, 3, 4], vec![5, 6, 7, 8]]).expect("plane")
}

#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<SequenceEvent>>,
    closed: AtomicUsize,
}

impl RecordingListener {
    fn events(&self) -> Vec<SequenceEvent> {
        self.events.lock().expect("events").clone()
    }

    fn weak(self: &Arc<Self>) -> Weak<dyn SequenceListener> {
        let weak: Weak<dyn SequenceListener> = Arc::downgrade(self) as _;
        weak
    }
}

impl SequenceListener for RecordingListener {
    fn sequence_changed(&self, event: &SequenceEvent) {
        self.events.lock().expect("events").push(event.clone());
    }

    fn sequence_closed(&self, _sequence: &Sequence) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct ModelCounter {
    images: AtomicUsize,
    dimensions: AtomicUsize,
}

impl SequenceModelListener for ModelCounter {
    fn image_changed(&self) {
        self.images.fetch_add(1, Ordering::SeqCst);
    }

    fn dimension_changed(&self) {
        self.dimensions.fetch_add(1, Ordering::SeqCst);
    }
}

/// Serves planes filled with `t * 10 + z` and counts the loads.
struct CountingProvider {
    loads: AtomicUsize,
}

impl ImageProvider for CountingProvider {
    fn load_plane(&self, t: usize, z: usize) -> Result<PlaneData> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let value = (t * 10 + z) as u8;
        Ok(PlaneData::from_channels(2, 2, vec![vec![value; 4]])?)
    }
}

struct FailingProvider;

impl ImageProvider for FailingProvider {
    fn load_plane(&self, t: usize, z: usize) -> Result<PlaneData> {
        Err(SequenceError::Provider(format!("no data for ({t}, {z})")))
    }
}

#[test]
fn sizes_follow_stored_planes() {
    let ctx = AppContext::new();
    let sequence = Sequence::new(&ctx);
    assert!(sequence.is_empty());
    assert!(sequence.is_default_name());
    assert_eq!(sequence.data_type(), None);

    sequence.set_image(0, 0, u8_plane(3, 2, vec![0; 6])).expect("t0 z0");
    sequence.set_image(0, 1, u8_plane(3, 2, vec![0; 6])).expect("t0 z1");
    sequence.set_image(2, 0, u8_plane(3, 2, vec![0; 6])).expect("t2 z0");

    assert_eq!(sequence.size_x(), 3);
    assert_eq!(sequence.size_y(), 2);
    assert_eq!(sequence.size_c(), 1);
    assert_eq!(sequence.size_z(), 2);
    assert_eq!(sequence.size_z_at(1), 0);
    assert_eq!(sequence.size_t(), 3);
    assert_eq!(sequence.num_image(), 3);
    assert_eq!(sequence.num_sample(), 3 * 2 * 2 * 3);
    assert_eq!(sequence.data_type(), Some(DataType::U8));

    sequence
        .add_image(u8_plane(3, 2, vec![0; 6]))
        .expect("appended");
    assert_eq!(sequence.size_z_at(2), 2);
}

#[test]
fn incompatible_plane_is_rejected() {
    let ctx = AppContext::new();
    let sequence = Sequence::from_plane(&ctx, u8_plane(2, 2, vec![0; 4])).expect("sequence");
    sequence.set_image(0, 1, u8_plane(2, 2, vec![0; 4])).expect("second plane");

    let wrong_type = Plane::zeros(DataType::U16, 2, 2, 1);
    assert!(matches!(
        sequence.set_image(0, 2, wrong_type),
        Err(SequenceError::IncompatibleData(_))
    ));
    let wrong_size = u8_plane(3, 1, vec![0; 3]);
    assert!(!sequence.is_compatible(&wrong_size));
    assert!(sequence.set_image(1, 0, wrong_size).is_err());
    assert_eq!(sequence.num_image(), 2);
}

#[test]
fn replacing_the_only_plane_changes_the_type() {
    let ctx = AppContext::new();
    let sequence = Sequence::from_plane(&ctx, u8_plane(2, 2, vec![0; 4])).expect("sequence");
    let listener = Arc::new(RecordingListener::default());
    sequence.add_listener(listener.weak());

    sequence
        .set_image(0, 0, Plane::zeros(DataType::F32, 4, 4, 3))
        .expect("type change");
    assert_eq!(sequence.data_type(), Some(DataType::F32));
    assert_eq!(sequence.size_c(), 3);
    assert_eq!(sequence.size_x(), 4);
    assert!(listener.events().iter().any(|event| matches!(
        &event.source,
        SequenceEventSource::Meta { field: Some(field), .. } if field == META_VIRTUAL
    )));
}

#[test]
fn removing_the_last_plane_resets_the_color_model() {
    let ctx = AppContext::new();
    let sequence = Sequence::from_plane(&ctx, u8_plane(2, 2, vec![0; 4])).expect("sequence");
    sequence.set_image(0, 1, u8_plane(2, 2, vec![0; 4])).expect("second plane");

    assert!(sequence.remove_image(0, 0));
    assert!(sequence.color_model().is_some());
    assert!(sequence.remove_image(0, 1));
    assert!(!sequence.remove_image(0, 1));
    assert!(sequence.is_empty());
    assert_eq!(sequence.size_t(), 0);
    assert!(sequence.color_model().is_none());

    // any type is accepted again
    sequence
        .set_image(0, 0, Plane::zeros(DataType::I16, 5, 5, 2))
        .expect("fresh plane");
    assert_eq!(sequence.data_type(), Some(DataType::I16));
}

#[test]
fn pack_removes_z_gaps_and_empty_time_points() {
    let ctx = AppContext::new();
    let sequence = Sequence::new(&ctx);
    sequence.set_image(0, 0, u8_plane(1, 1, vec![1])).expect("plane");
    sequence.set_image(0, 3, u8_plane(1, 1, vec![2])).expect("plane");
    assert_eq!(sequence.size_z(), 4);

    sequence.pack_image_list();
    assert_eq!(sequence.size_z(), 2);
    assert_eq!(sequence.data(0, 1, 0, 0, 0).expect("value"), 2.0);
}

#[test]
fn volumetric_image_packs_and_clears() {
    let mut volume = VolumetricImage::new();
    let first = u8_plane(1, 1, vec![1]);
    let last = u8_plane(1, 1, vec![2]);
    volume.set_image(2, first.clone());
    volume.set_image(5, last.clone());
    assert_eq!(volume.size(), 6);
    assert_eq!(volume.num_image(), 2);
    assert_eq!(volume.first_image(), Some(&first));

    assert!(volume.pack());
    assert!(!volume.pack());
    assert_eq!(volume.image(0), Some(&first));
    assert_eq!(volume.image(1), Some(&last));
    assert_eq!(volume.size(), 2);

    assert_eq!(volume.clear().len(), 2);
    assert!(volume.is_empty());
}

#[test]
fn batched_insertions_notify_the_model_once() {
    let ctx = AppContext::new();
    let sequence = Sequence::new(&ctx);
    let counter = Arc::new(ModelCounter::default());
    let weak: Weak<dyn SequenceModelListener> = Arc::downgrade(&counter) as _;
    sequence.add_model_listener(weak);
    let listener = Arc::new(RecordingListener::default());
    sequence.add_listener(listener.weak());

    {
        let _scope = sequence.update_scope();
        for z in 0..100 {
            sequence
                .set_image(0, z, u8_plane(2, 2, vec![z as u8; 4]))
                .expect("plane");
        }
        assert!(sequence.is_updating());
        assert_eq!(counter.images.load(Ordering::SeqCst), 0);
    }

    assert!(!sequence.is_updating());
    assert_eq!(sequence.num_image(), 100);
    assert_eq!(counter.images.load(Ordering::SeqCst), 1);
    assert_eq!(counter.dimensions.load(Ordering::SeqCst), 1);
    let data_events = listener
        .events()
        .into_iter()
        .filter(|event| matches!(event.source, SequenceEventSource::Data(_)))
        .count();
    assert_eq!(data_events, 1);
    assert_eq!(sequence.channel_bounds(0), [0.0, 99.0]);
}

#[test]
fn channel_bounds_follow_plane_edits() {
    let ctx = AppContext::new();
    let sequence = Sequence::from_plane(&ctx, u8_plane(2, 2, vec![1, 2, 3, 4])).expect("sequence");
    sequence.set_image(0, 1, u8_plane(2, 2, vec![0, 9, 5, 5])).expect("plane");
    assert_eq!(sequence.channel_bounds(0), [0.0, 9.0]);
    assert_eq!(sequence.channel_type_bounds(0), [0.0, 15.0]);

    let plane = sequence.image(0, 0).expect("plane");
    {
        let _scope = sequence.update_scope();
        plane.set_value(0, 0, 0, 20.0).expect("set");
        assert_eq!(sequence.channel_bounds_state(), ChannelBoundsState::Invalid);
    }
    assert_eq!(sequence.channel_bounds_state(), ChannelBoundsState::Valid);
    assert_eq!(sequence.channel_max(0), 20.0);
    assert_eq!(sequence.channels_global_bounds(), [0.0, 20.0]);

    sequence.set_auto_update_channel_bounds(false);
    plane.set_value(0, 0, 0, 200.0).expect("set");
    assert_eq!(sequence.channel_max(0), 20.0);
    sequence.set_auto_update_channel_bounds(true);
    assert_eq!(sequence.channel_max(0), 200.0);
}

#[test]
fn inserting_planes_in_a_scope_invalidates_bounds() {
    let ctx = AppContext::new();
    let sequence = Sequence::from_plane(&ctx, u8_plane(2, 2, vec![1, 2, 3, 4])).expect("sequence");
    assert_eq!(sequence.channel_bounds_state(), ChannelBoundsState::Valid);
    {
        let _scope = sequence.update_scope();
        sequence.set_image(0, 1, u8_plane(2, 2, vec![90, 2, 3, 4])).expect("plane");
        assert_eq!(sequence.channel_bounds_state(), ChannelBoundsState::Invalid);
        assert!(sequence.remove_image(0, 1));
        assert_eq!(sequence.channel_bounds_state(), ChannelBoundsState::Invalid);
        sequence.set_image(0, 1, u8_plane(2, 2, vec![70, 2, 3, 4])).expect("plane");
    }
    assert_eq!(sequence.channel_bounds_state(), ChannelBoundsState::Valid);
    assert_eq!(sequence.channel_bounds(0), [1.0, 70.0]);
}

#[test]
fn undo_and_redo_restore_plane_data() {
    let ctx = AppContext::new();
    let sequence = Sequence::from_plane(&ctx, u8_plane(2, 2, vec![1, 2, 3, 4])).expect("sequence");
    let plane = sequence.image(0, 0).expect("plane");
    assert!(!sequence.can_undo());

    sequence.create_undo_data_point("paint").expect("undo point");
    plane.set_value(0, 0, 0, 9.0).expect("set");
    assert_eq!(sequence.undo_description().as_deref(), Some("paint"));

    assert!(sequence.undo().expect("undo"));
    assert_eq!(sequence.data(0, 0, 0, 0, 0).expect("value"), 1.0);
    assert_eq!(sequence.image(0, 0), Some(plane.clone()));
    assert!(sequence.can_redo());

    assert!(sequence.redo().expect("redo"));
    assert_eq!(sequence.data(0, 0, 0, 0, 0).expect("value"), 9.0);
    assert!(!sequence.redo().expect("nothing to redo"));
}

#[test]
fn undo_restores_removed_planes_and_metadata() {
    let ctx = AppContext::new();
    let sequence = Sequence::from_plane(&ctx, u8_plane(1, 1, vec![7])).expect("sequence");
    sequence.set_image(0, 1, u8_plane(1, 1, vec![8])).expect("plane");
    sequence.set_name("before");

    sequence.create_undo_point("crop").expect("undo point");
    sequence.remove_image(0, 1);
    sequence.set_name("after");
    assert_eq!(sequence.num_image(), 1);

    assert!(sequence.undo().expect("undo"));
    assert_eq!(sequence.num_image(), 2);
    assert_eq!(sequence.data(0, 1, 0, 0, 0).expect("value"), 8.0);
    assert_eq!(sequence.name(), "before");

    sequence.clear_undo_history();
    assert!(!sequence.can_undo());
    assert!(!sequence.can_redo());
}

#[test]
fn copies_are_independent() {
    let ctx = AppContext::new();
    let source = Sequence::from_plane(&ctx, u8_plane(2, 1, vec![3, 4])).expect("source");
    source.set_name("source");
    let target = Sequence::new(&ctx);

    target.copy_from(&source, false).expect("copy");
    assert_eq!(target.num_image(), 1);
    assert_ne!(target.name(), "source");

    source
        .image(0, 0)
        .expect("plane")
        .set_value(0, 0, 0, 100.0)
        .expect("set");
    assert_eq!(target.data(0, 0, 0, 0, 0).expect("value"), 3.0);
}

#[test]
fn copy_accessors_follow_requested_layout() {
    let ctx = AppContext::new();
    let sequence = Sequence::from_plane(&ctx, two_channel_plane()).expect("sequence");

    assert_eq!(sequence.data_copy_xy::<u16>(0, 0, 1).expect("xy"), [5, 6, 7, 8]);
    assert_eq!(
        sequence.data_copy_xyc::<u16>(0, 0).expect("xyc"),
        [1, 2, 3, 4, 5, 6, 7, 8]
    );
    assert_eq!(
        sequence.data_copy_cxy::<u16>(0, 0).expect("cxy"),
        [1, 5, 2, 6, 3, 7, 4, 8]
    );
    assert_eq!(sequence.data_copy_c::<u16>(0, 0, 1, 0).expect("c"), [2, 6]);

    let mut out = vec![0_u16; 2];
    let written = sequence
        .data_copy_xy_into::<u16>(0, 0, 0, &mut out, 2)
        .expect("into");
    assert_eq!(written, 4);
    assert_eq!(out, [0, 0, 1, 2, 3, 4]);

    let channel = sequence.data_xy::<u16>(0, 0, 1).expect("ref").expect("plane");
    assert_eq!(channel[(1, 0)], 7);
}

#[test]
fn copy_accessors_leave_missing_planes_zeroed() {
    let ctx = AppContext::new();
    let sequence = Sequence::new(&ctx);
    sequence.set_image(1, 0, two_channel_plane()).expect("plane");

    let all = sequence.data_copy_xyczt::<u16>().expect("xyczt");
    assert_eq!(all.len(), 16);
    assert!(all[..8].iter().all(|value| *value == 0));
    assert_eq!(all[8..], [1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(sequence.data_copy_xyzt::<u16>(1).expect("xyzt").len(), 8);
}

#[test]
fn copy_accessors_check_type_and_channel() {
    let ctx = AppContext::new();
    let sequence = Sequence::from_plane(&ctx, two_channel_plane()).expect("sequence");

    assert!(matches!(
        sequence.data_copy_xyc::<f32>(0, 0),
        Err(SequenceError::TypeMismatch {
            expected: DataType::U16,
            actual: DataType::F32
        })
    ));
    assert!(matches!(
        sequence.data_copy_xy::<u16>(0, 0, 2),
        Err(SequenceError::OutOfBounds(_))
    ));
}

#[test]
fn oversized_copy_is_refused_before_loading() {
    let ctx = AppContext::new();
    let sequence = Sequence::new(&ctx);
    let plane = Plane::lazy(Arc::new(FailingProvider), 0, 0, 50_000, 50_000, 1, DataType::U8);
    sequence.set_image(0, 0, plane).expect("lazy plane");

    assert!(matches!(
        sequence.data_copy_xy::<u8>(0, 0, 0),
        Err(SequenceError::CapacityExceeded { requested }) if requested == 2_500_000_000
    ));
    assert!(!sequence.is_data_loaded(0, 0));
}

#[test]
fn interpolation_blends_neighbors() {
    let ctx = AppContext::new();
    let sequence = Sequence::from_plane(&ctx, u8_plane(2, 1, vec![0, 10])).expect("sequence");
    sequence.set_image(0, 1, u8_plane(2, 1, vec![20, 30])).expect("plane");

    let plane = sequence.image(0, 0).expect("plane");
    assert_eq!(plane.data_interpolated(0.5, 0.0, 0).expect("xy"), 5.0);
    assert_eq!(plane.data_interpolated(-1.0, 0.0, 0).expect("outside"), 0.0);
    assert_eq!(
        sequence.data_interpolated(0, 0.5, 0, 0.0, 0.5).expect("xyz"),
        15.0
    );
    assert_eq!(
        sequence.data_interpolated(0, 1.0, 0, 0.0, 0.5).expect("last plane"),
        25.0
    );
    assert_eq!(sequence.data_interpolated(0, 2.0, 0, 0.0, 0.5).expect("past"), 0.0);
    assert_eq!(sequence.data_interpolated(0, 1e30, 0, 0.0, 0.5).expect("far"), 0.0);
    assert_eq!(
        sequence.data_interpolated(0, f64::NAN, 0, 0.0, 0.5).expect("nan"),
        0.0
    );
}

#[test]
fn copy_into_rejects_bad_offsets_and_positions() {
    let ctx = AppContext::new();
    let sequence = Sequence::from_plane(&ctx, two_channel_plane()).expect("sequence");

    let mut out = vec![7_u16; 3];
    assert!(sequence
        .data_copy_xy_into::<u16>(0, 0, 0, &mut out, usize::MAX)
        .is_err());
    assert!(matches!(
        sequence.data_copy_c_into::<u16>(0, 0, 2, 0, &mut out, 10),
        Err(SequenceError::OutOfBounds(_))
    ));
    assert!(sequence
        .data_copy_c_into::<u16>(0, 0, 0, 0, &mut out, usize::MAX)
        .is_err());
    assert_eq!(out, [7, 7, 7]);
}

#[test]
fn volatile_round_trip_keeps_samples() {
    let ctx = AppContext::new();
    let sequence = Sequence::from_plane(&ctx, two_channel_plane()).expect("sequence");
    let listener = Arc::new(RecordingListener::default());
    sequence.add_listener(listener.weak());

    sequence.set_volatile(true).expect("volatile");
    assert!(sequence.is_volatile());
    assert_eq!(
        sequence.data_copy_xyc::<u16>(0, 0).expect("read back"),
        [1, 2, 3, 4, 5, 6, 7, 8]
    );
    sequence.set_data_xy(0, 0, 0, &[9_u16, 9, 9, 9]).expect("write");

    sequence.set_volatile(false).expect("resident");
    assert!(!sequence.is_volatile());
    assert_eq!(sequence.data_copy_xy::<u16>(0, 0, 0).expect("xy"), [9, 9, 9, 9]);
    assert!(listener.events().iter().any(|event| matches!(
        &event.source,
        SequenceEventSource::Meta { field: Some(field), .. } if field == META_VIRTUAL
    )));
}

#[test]
fn failed_volatile_switch_restores_switched_planes() {
    let ctx = AppContext::new();
    let sequence = Sequence::from_plane(&ctx, u8_plane(2, 2, vec![1, 2, 3, 4])).expect("sequence");
    sequence.set_image(0, 1, u8_plane(2, 2, vec![5, 6, 7, 8])).expect("plane");
    sequence.set_volatile(true).expect("volatile");
    let first = sequence.image(0, 0).expect("first");
    let second = sequence.image(0, 1).expect("second");
    second.truncate_offloaded().expect("truncate");
    let listener = Arc::new(RecordingListener::default());
    sequence.add_listener(listener.weak());

    assert!(matches!(
        sequence.set_volatile(false),
        Err(SequenceError::Core(CoreError::InvalidLength { expected: 4, actual: 0 }))
    ));
    assert!(first.is_volatile());
    assert!(second.is_volatile());
    assert!(sequence.is_volatile());
    assert_eq!(sequence.data_copy_xy::<u8>(0, 0, 0).expect("first data"), [1, 2, 3, 4]);
    assert!(listener.events().is_empty());
}

#[test]
fn lazy_planes_load_on_access_and_prefetch_neighbors() {
    let ctx = AppContext::new();
    let provider = Arc::new(CountingProvider {
        loads: AtomicUsize::new(0),
    });
    let sequence = Sequence::new(&ctx);
    for z in 0..3 {
        let plane = Plane::lazy(provider.clone(), 0, z, 2, 2, 1, DataType::U8);
        sequence.set_image(0, z, plane).expect("lazy plane");
    }
    assert_eq!(provider.loads.load(Ordering::SeqCst), 0);

    let middle = sequence.image(0, 1).expect("plane");
    ctx.prefetcher().wait_idle();
    assert!(sequence.is_data_loaded(0, 0));
    assert!(sequence.is_data_loaded(0, 2));
    assert!(!middle.is_data_loaded());

    assert_eq!(middle.value(0, 0, 0).expect("value"), 1.0);
    assert_eq!(provider.loads.load(Ordering::SeqCst), 3);
    assert_eq!(sequence.channel_bounds(0), [0.0, 2.0]);
}

#[test]
fn data_reads_prefetch_neighbor_time_points() {
    let ctx = AppContext::new();
    let provider = Arc::new(CountingProvider {
        loads: AtomicUsize::new(0),
    });
    let sequence = Sequence::new(&ctx);
    for t in 0..3 {
        let plane = Plane::lazy(provider.clone(), t, 0, 2, 2, 1, DataType::U8);
        sequence.set_image(t, 0, plane).expect("lazy plane");
    }

    assert_eq!(sequence.data_copy_xy::<u8>(1, 0, 0).expect("xy"), [10; 4]);
    ctx.prefetcher().wait_idle();
    assert!(sequence.is_data_loaded(0, 0));
    assert!(sequence.is_data_loaded(2, 0));
    assert_eq!(provider.loads.load(Ordering::SeqCst), 3);
}

#[test]
fn missing_plane_still_prefetches_neighbors() {
    let ctx = AppContext::new();
    let provider = Arc::new(CountingProvider {
        loads: AtomicUsize::new(0),
    });
    let sequence = Sequence::new(&ctx);
    for t in [0, 2] {
        let plane = Plane::lazy(provider.clone(), t, 0, 2, 2, 1, DataType::U8);
        sequence.set_image(t, 0, plane).expect("lazy plane");
    }

    assert!(sequence.image(1, 0).is_none());
    ctx.prefetcher().wait_idle();
    assert!(sequence.is_data_loaded(0, 0));
    assert!(sequence.is_data_loaded(2, 0));
}

#[test]
fn provider_failure_is_reported() {
    let ctx = AppContext::new();
    let plane = Plane::lazy(Arc::new(FailingProvider), 0, 0, 2, 2, 1, DataType::U8);
    let sequence = Sequence::from_plane(&ctx, plane).expect("sequence");
    assert!(matches!(
        sequence.load_all_data(),
        Err(SequenceError::Provider(_))
    ));
}

#[test]
fn roi_batch_is_one_undo_step() {
    let ctx = AppContext::new();
    let sequence = Sequence::new(&ctx);
    let first = Roi::new("first");
    let second = Roi::new("second");

    assert!(sequence.add_rois(&[first.clone(), second.clone()]));
    assert!(!sequence.add_roi(first.clone()));
    assert_eq!(sequence.rois().len(), 2);
    assert!(sequence.contains_overlay(first.overlay()));

    assert!(sequence.remove_all_rois());
    assert!(sequence.rois().is_empty());
    assert!(!sequence.contains_overlay(first.overlay()));

    assert!(sequence.undo().expect("undo removal"));
    assert_eq!(sequence.rois(), [first.clone(), second.clone()]);
    assert!(sequence.undo().expect("undo addition"));
    assert!(sequence.rois().is_empty());
    assert!(sequence.redo().expect("redo addition"));
    assert_eq!(sequence.rois().len(), 2);
}

#[test]
fn roi_selection_is_exclusive() {
    let ctx = AppContext::new();
    let sequence = Sequence::new(&ctx);
    let first = Roi::new("first");
    let second = Roi::new("second");
    sequence.add_rois(&[first.clone(), second.clone()]);

    assert!(sequence.set_selected_roi(Some(&first)));
    assert_eq!(sequence.selected_rois(), [first.clone()]);
    assert!(sequence.set_selected_roi(Some(&second)));
    assert_eq!(sequence.selected_roi(), Some(second.clone()));
    assert!(!sequence.set_selected_roi(Some(&Roi::new("stranger"))));
    assert!(sequence.selected_rois().is_empty());

    assert!(sequence.set_selected_roi(Some(&first)));
    assert!(!sequence.set_selected_roi(None));
    assert!(sequence.selected_roi().is_none());

    sequence.set_selected_rois(&[first.clone(), second.clone()]);
    second.set_read_only(true);
    assert!(sequence.remove_selected_rois(false));
    assert_eq!(sequence.rois(), [second.clone()]);
}

#[test]
fn roi_changes_reach_sequence_listeners() {
    let ctx = AppContext::new();
    let sequence = Sequence::new(&ctx);
    let roi = Roi::new("cell");
    sequence.add_roi(roi.clone());
    let listener = Arc::new(RecordingListener::default());
    sequence.add_listener(listener.weak());

    roi.set_name("nucleus");
    let events = listener.events();
    assert!(events.iter().any(|event| event.source == SequenceEventSource::Roi(roi.clone())
        && event.kind == SequenceEventType::Changed));
}

#[test]
fn legacy_listeners_receive_painter_events() {
    let ctx = AppContext::new();
    let sequence = Sequence::new(&ctx);
    let legacy = Arc::new(RecordingListener::default());
    let current = Arc::new(RecordingListener::default());
    sequence.add_legacy_listener(legacy.weak());
    sequence.add_listener(current.weak());

    let overlay = Overlay::new("grid");
    assert!(sequence.add_overlay(overlay.clone()));
    overlay.painter_changed();

    let painter = |events: Vec<SequenceEvent>| {
        events
            .into_iter()
            .filter(|event| matches!(event.source, SequenceEventSource::Painter(_)))
            .count()
    };
    assert_eq!(painter(legacy.events()), 2);
    assert_eq!(painter(current.events()), 0);
    assert_eq!(current.events().len(), 2);
}

#[test]
fn metadata_setters_validate_and_notify() {
    let ctx = AppContext::new();
    let sequence = Sequence::new(&ctx);
    let listener = Arc::new(RecordingListener::default());
    sequence.add_listener(listener.weak());

    assert!(sequence.set_pixel_size_x(0.25));
    assert!(!sequence.set_pixel_size_x(-1.0));
    assert!(!sequence.set_time_interval(f64::NAN));
    assert_eq!(sequence.pixel_size_x(), 0.25);
    assert_eq!(sequence.time_interval(), 1.0);

    sequence.set_channel_name(1, "GFP");
    assert_eq!(sequence.channel_name(1), "GFP");
    assert!(sequence.is_default_channel_name(0));

    // unchanged value: no event
    sequence.set_channel_name(1, "GFP");
    let meta_events = listener
        .events()
        .into_iter()
        .filter(|event| matches!(event.source, SequenceEventSource::Meta { .. }))
        .count();
    assert_eq!(meta_events, 2);

    sequence.set_position_t_offset(2, 0, 0, 7.5);
    assert_eq!(sequence.position_t_offset(2, 0, 0), 7.5);
    assert_eq!(sequence.position_t_offset(3, 0, 0), 3.0);
}

#[test]
fn metadata_persists_across_sequences() {
    let dir = tempfile::tempdir().expect("tempdir");
    let persistence = JsonFilePersistence::new(dir.path().join("meta")).expect("persistence");
    let ctx = AppContext::new().with_persistence(Arc::new(persistence));

    let first = Sequence::new(&ctx);
    first.set_filename(Some("/data/cells.tif".into()));
    first.set_name("cells");
    first.set_pixel_size_z(2.0);
    let listener = Arc::new(RecordingListener::default());
    first.add_listener(listener.weak());
    first.close();
    first.close();
    assert!(first.is_closed());
    assert_eq!(listener.closed.load(Ordering::SeqCst), 1);
    assert!(dir.path().join("meta").join("cells.json").exists());

    let second = Sequence::new(&ctx);
    second.set_filename(Some("/elsewhere/cells.tif".into()));
    assert!(second.load_metadata().expect("load"));
    assert_eq!(second.name(), "cells");
    assert_eq!(second.pixel_size_z(), 2.0);

    let plain = Sequence::new(&AppContext::new());
    assert!(!plain.is_persistence_enabled());
    assert!(!plain.save_metadata());
    assert!(!plain.load_metadata().expect("no backend"));
}

#[test]
fn data_events_merge_into_a_generic_change() {
    let first = Plane::zeros(DataType::U8, 1, 1, 1);
    let second = Plane::zeros(DataType::U8, 1, 1, 1);
    let mut event = SequenceEvent::new(
        1,
        SequenceEventSource::Data(Some(first.clone())),
        SequenceEventType::Added,
    );

    let same = SequenceEvent::new(
        1,
        SequenceEventSource::Data(Some(first.clone())),
        SequenceEventType::Added,
    );
    assert!(event.collapse(&same));
    assert_eq!(event.source, SequenceEventSource::Data(Some(first)));
    assert_eq!(event.kind, SequenceEventType::Added);

    let other = SequenceEvent::new(
        1,
        SequenceEventSource::Data(Some(second)),
        SequenceEventType::Removed,
    );
    assert!(event.collapse(&other));
    assert_eq!(event.source, SequenceEventSource::Data(None));
    assert_eq!(event.kind, SequenceEventType::Changed);

    let foreign = SequenceEvent::changed(2, SequenceEventSource::Data(None));
    assert!(!event.collapse(&foreign));
}

#[test]
fn meta_events_merge_per_field() {
    let meta = |field: &str, param: Option<usize>| {
        SequenceEvent::changed(
            1,
            SequenceEventSource::Meta {
                field: Some(field.to_string()),
                param,
            },
        )
    };
    let mut event = meta("channelName", Some(0));
    assert!(event.collapse(&meta("channelName", Some(1))));
    assert_eq!(
        event.source,
        SequenceEventSource::Meta {
            field: Some("channelName".to_string()),
            param: None
        }
    );
    assert!(!event.collapse(&meta("name", None)));

    let roi = Roi::new("a");
    let mut added = SequenceEvent::new(1, SequenceEventSource::Roi(roi.clone()), SequenceEventType::Added);
    let removed = SequenceEvent::new(1, SequenceEventSource::Roi(roi), SequenceEventType::Removed);
    assert!(added.collapse(&removed));
    assert_eq!(added.kind, SequenceEventType::Changed);
    assert!(!added.collapse(&SequenceEvent::changed(1, SequenceEventSource::Roi(Roi::new("b")))));
}
