use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::capture::domain::camera_position::CameraPosition;
use crate::capture::domain::capture_device::{CaptureDevice, DeviceDescriptor, DeviceDiscovery};
use crate::capture::domain::capture_error::CaptureError;
use crate::capture::domain::device_selector::DeviceSelector;
use crate::capture::domain::frame_source::{FrameDelivery, FrameHandler, FrameSource, SwitchHook};

/// Frame source that drives one attached device from a dedicated capture thread.
///
/// Layout: `device.next_frame() → orientation.normalize() → handler`
///
/// Frames the handler reports as [`FrameDelivery::Dropped`] are counted and
/// discarded; the source never buffers.
pub struct CameraFrameSource {
    discovery: Box<dyn DeviceDiscovery>,
    selector: DeviceSelector,
    position: CameraPosition,
    epoch: u64,
    attached: Option<AttachedDevice>,
    active_id: Option<String>,
    handler: Option<FrameHandler>,
    capture: Option<CaptureThread>,
    dropped: Arc<AtomicU64>,
    delivered: Arc<AtomicU64>,
}

struct AttachedDevice {
    descriptor: DeviceDescriptor,
    device: Box<dyn CaptureDevice>,
    next_sequence: u64,
}

struct CaptureThread {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<(AttachedDevice, FrameHandler)>,
}

impl CameraFrameSource {
    /// Attaches the preferred device at `position`.
    pub fn new(
        mut discovery: Box<dyn DeviceDiscovery>,
        selector: DeviceSelector,
        position: CameraPosition,
    ) -> Result<Self, CaptureError> {
        let devices = discovery.devices();
        let descriptor = selector
            .select(&devices, position)
            .cloned()
            .ok_or(CaptureError::NoDeviceAvailable(position))?;
        let device = discovery.open(&descriptor)?;
        log::info!("Attached {position} camera {}", descriptor.id);

        Ok(Self {
            discovery,
            selector,
            position,
            epoch: 0,
            active_id: Some(descriptor.id.clone()),
            attached: Some(AttachedDevice {
                descriptor,
                device,
                next_sequence: 0,
            }),
            handler: None,
            capture: None,
            dropped: Arc::new(AtomicU64::new(0)),
            delivered: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Id of the attached device, if any.
    pub fn device_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    /// Frames discarded because the consumer was busy.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Frames the consumer accepted.
    pub fn delivered_frames(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    fn spawn_capture(&mut self, handler: FrameHandler) -> Result<(), CaptureError> {
        let attached = match self.attached.take() {
            Some(a) => a,
            None => {
                self.handler = Some(handler);
                return Err(CaptureError::NoDeviceAvailable(self.position));
            }
        };

        let stop = Arc::new(AtomicBool::new(false));
        let handle = spawn_capture_loop(
            attached,
            handler,
            self.epoch,
            stop.clone(),
            self.dropped.clone(),
            self.delivered.clone(),
        );
        self.capture = Some(CaptureThread { stop, handle });
        Ok(())
    }

    /// Reattaches `previous` after a failed switch. Failures are logged; the
    /// caller reports the original open error.
    fn restore(&mut self, previous: Option<DeviceDescriptor>, was_running: bool) {
        let Some(previous) = previous else {
            return;
        };
        let id = previous.id.clone();
        if let Err(e) = self.open_descriptor(previous) {
            log::error!("Failed to reopen previous camera {id}: {e}; capture stays stopped");
            return;
        }
        if was_running {
            if let Some(handler) = self.handler.take() {
                if let Err(e) = self.spawn_capture(handler) {
                    log::error!("Failed to restart capture on {id}: {e}");
                }
            }
        }
    }

    fn open_descriptor(&mut self, descriptor: DeviceDescriptor) -> Result<(), CaptureError> {
        let device = self.discovery.open(&descriptor)?;
        self.active_id = Some(descriptor.id.clone());
        self.attached = Some(AttachedDevice {
            descriptor,
            device,
            next_sequence: 0,
        });
        Ok(())
    }
}

impl FrameSource for CameraFrameSource {
    fn start(&mut self, handler: FrameHandler) -> Result<(), CaptureError> {
        if self.is_running() {
            return Err(CaptureError::AlreadyRunning);
        }
        // Reclaims the device from a capture thread that ended on its own.
        self.stop();
        self.spawn_capture(handler)?;
        log::debug!("Capture started on {} camera (epoch {})", self.position, self.epoch);
        Ok(())
    }

    fn stop(&mut self) {
        let Some(capture) = self.capture.take() else {
            return;
        };
        capture.stop.store(true, Ordering::Relaxed);
        match capture.handle.join() {
            Ok((attached, handler)) => {
                self.attached = Some(attached);
                self.handler = Some(handler);
            }
            Err(_) => {
                self.active_id = None;
                log::error!("Capture thread panicked; device detached");
            }
        }
    }

    fn switch_position(
        &mut self,
        target: CameraPosition,
        on_switch: SwitchHook<'_>,
    ) -> Result<u64, CaptureError> {
        let devices = self.discovery.devices();
        let descriptor = match self.selector.select(&devices, target) {
            Some(d) => d.clone(),
            None => {
                log::warn!("No {target} camera available; staying on {}", self.position);
                return Err(CaptureError::NoDeviceAvailable(target));
            }
        };

        let was_running = self.is_running();
        // Invalidate in-flight work before tearing down; frames still leaving
        // the old device carry the previous epoch.
        self.epoch += 1;
        on_switch(self.epoch);

        self.stop();
        let previous = self.attached.take().map(|a| a.descriptor);
        self.active_id = None;

        if let Err(e) = self.open_descriptor(descriptor.clone()) {
            log::warn!("Failed to open {}: {e}; restoring previous camera", descriptor.id);
            self.restore(previous, was_running);
            return Err(e);
        }

        self.position = target;
        log::info!("Switched to {target} camera {} (epoch {})", descriptor.id, self.epoch);

        if was_running {
            if let Some(handler) = self.handler.take() {
                self.spawn_capture(handler)?;
            }
        }
        Ok(self.epoch)
    }

    fn position(&self) -> CameraPosition {
        self.position
    }

    fn epoch(&self) -> u64 {
        self.epoch
    }

    fn is_running(&self) -> bool {
        self.capture
            .as_ref()
            .is_some_and(|capture| !capture.handle.is_finished())
    }
}

impl Drop for CameraFrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_capture_loop(
    mut attached: AttachedDevice,
    mut handler: FrameHandler,
    epoch: u64,
    stop: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    delivered: Arc<AtomicU64>,
) -> JoinHandle<(AttachedDevice, FrameHandler)> {
    std::thread::spawn(move || {
        let orientation = attached.descriptor.orientation;
        while !stop.load(Ordering::Relaxed) {
            let frame = match attached.device.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("Camera {} reached end of stream", attached.descriptor.id);
                    break;
                }
                Err(e) => {
                    log::warn!("{e}");
                    break;
                }
            };
            if stop.load(Ordering::Relaxed) {
                break;
            }

            let sequence = attached.next_sequence;
            attached.next_sequence += 1;
            let upright = orientation.normalize(frame.stamped(sequence, epoch));

            match handler(upright) {
                FrameDelivery::Accepted => {
                    delivered.fetch_add(1, Ordering::Relaxed);
                }
                FrameDelivery::Dropped => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
                FrameDelivery::Closed => break,
            }
        }
        (attached, handler)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use crate::capture::domain::capture_device::DeviceKind;
    use crate::capture::domain::orientation::{Orientation, Rotation};
    use crate::shared::frame::{PixelFormat, RawFrame};

    /// Emits a fixed number of 1x1 gray frames whose value is the device tag.
    struct ScriptedDevice {
        id: String,
        tag: u8,
        remaining: usize,
        released: Arc<Mutex<Vec<String>>>,
    }

    impl Drop for ScriptedDevice {
        fn drop(&mut self) {
            self.released.lock().unwrap().push(self.id.clone());
        }
    }

    impl CaptureDevice for ScriptedDevice {
        fn next_frame(&mut self) -> Result<Option<RawFrame>, CaptureError> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            std::thread::sleep(Duration::from_millis(1));
            Ok(Some(RawFrame::new(vec![self.tag], 1, 1, PixelFormat::Gray8)))
        }
    }

    struct FakeDiscovery {
        devices: Vec<DeviceDescriptor>,
        frames_per_device: usize,
        fail_open: Arc<Mutex<Vec<String>>>,
        opened: Arc<Mutex<Vec<String>>>,
        released: Arc<Mutex<Vec<String>>>,
    }

    impl FakeDiscovery {
        fn new(devices: Vec<DeviceDescriptor>, frames_per_device: usize) -> Self {
            Self {
                devices,
                frames_per_device,
                fail_open: Arc::new(Mutex::new(Vec::new())),
                opened: Arc::new(Mutex::new(Vec::new())),
                released: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl DeviceDiscovery for FakeDiscovery {
        fn devices(&self) -> Vec<DeviceDescriptor> {
            self.devices.clone()
        }

        fn open(
            &mut self,
            descriptor: &DeviceDescriptor,
        ) -> Result<Box<dyn CaptureDevice>, CaptureError> {
            if self.fail_open.lock().unwrap().contains(&descriptor.id) {
                return Err(CaptureError::DeviceOpen {
                    id: descriptor.id.clone(),
                    reason: "busy".into(),
                });
            }
            self.opened.lock().unwrap().push(descriptor.id.clone());
            let tag = if descriptor.position == CameraPosition::Front { 1 } else { 2 };
            Ok(Box::new(ScriptedDevice {
                id: descriptor.id.clone(),
                tag,
                remaining: self.frames_per_device,
                released: self.released.clone(),
            }))
        }
    }

    fn descriptor(id: &str, position: CameraPosition) -> DeviceDescriptor {
        DeviceDescriptor {
            id: id.to_string(),
            position,
            kind: DeviceKind::WideAngle,
            orientation: Orientation::UPRIGHT,
        }
    }

    fn both_cameras() -> Vec<DeviceDescriptor> {
        vec![
            descriptor("front", CameraPosition::Front),
            descriptor("back", CameraPosition::Back),
        ]
    }

    fn collecting_handler(
        delivery: FrameDelivery,
    ) -> (FrameHandler, Arc<Mutex<VecDeque<RawFrame>>>) {
        let seen = Arc::new(Mutex::new(VecDeque::new()));
        let sink = seen.clone();
        let handler: FrameHandler = Box::new(move |frame| {
            sink.lock().unwrap().push_back(frame);
            delivery
        });
        (handler, seen)
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met within timeout");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_new_without_device_at_position_fails() {
        let discovery = FakeDiscovery::new(vec![descriptor("back", CameraPosition::Back)], 1);
        let result =
            CameraFrameSource::new(Box::new(discovery), DeviceSelector::default(), CameraPosition::Front);
        assert!(matches!(result, Err(CaptureError::NoDeviceAvailable(CameraPosition::Front))));
    }

    #[test]
    fn test_delivers_stamped_frames_in_order() {
        let discovery = FakeDiscovery::new(both_cameras(), 5);
        let mut source =
            CameraFrameSource::new(Box::new(discovery), DeviceSelector::default(), CameraPosition::Front)
                .unwrap();
        let (handler, seen) = collecting_handler(FrameDelivery::Accepted);
        source.start(handler).unwrap();

        wait_until(|| seen.lock().unwrap().len() == 5);
        source.stop();

        let frames = seen.lock().unwrap();
        let sequences: Vec<u64> = frames.iter().map(|f| f.sequence()).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
        assert!(frames.iter().all(|f| f.epoch() == 0 && f.data() == [1]));
        assert_eq!(source.delivered_frames(), 5);
    }

    #[test]
    fn test_counts_dropped_frames() {
        let discovery = FakeDiscovery::new(both_cameras(), 3);
        let mut source =
            CameraFrameSource::new(Box::new(discovery), DeviceSelector::default(), CameraPosition::Front)
                .unwrap();
        let (handler, seen) = collecting_handler(FrameDelivery::Dropped);
        source.start(handler).unwrap();

        wait_until(|| seen.lock().unwrap().len() == 3);
        wait_until(|| source.dropped_frames() == 3);
        assert_eq!(source.delivered_frames(), 0);
    }

    #[test]
    fn test_start_twice_errors() {
        let discovery = FakeDiscovery::new(both_cameras(), 1000);
        let mut source =
            CameraFrameSource::new(Box::new(discovery), DeviceSelector::default(), CameraPosition::Front)
                .unwrap();
        source.start(collecting_handler(FrameDelivery::Accepted).0).unwrap();
        let second = source.start(collecting_handler(FrameDelivery::Accepted).0);
        assert!(matches!(second, Err(CaptureError::AlreadyRunning)));
        source.stop();
        assert!(!source.is_running());
    }

    #[test]
    fn test_switch_changes_device_and_epoch() {
        let discovery = FakeDiscovery::new(both_cameras(), 1000);
        let mut source =
            CameraFrameSource::new(Box::new(discovery), DeviceSelector::default(), CameraPosition::Front)
                .unwrap();
        let (handler, seen) = collecting_handler(FrameDelivery::Accepted);
        source.start(handler).unwrap();
        wait_until(|| !seen.lock().unwrap().is_empty());

        let hook_epoch = Arc::new(AtomicU64::new(0));
        let hook_seen = hook_epoch.clone();
        let epoch = source
            .switch_position(CameraPosition::Back, &move |e: u64| hook_seen.store(e, Ordering::SeqCst))
            .unwrap();

        assert_eq!(epoch, 1);
        assert_eq!(hook_epoch.load(Ordering::SeqCst), 1);
        assert_eq!(source.position(), CameraPosition::Back);
        assert_eq!(source.device_id(), Some("back"));
        assert!(source.is_running());

        seen.lock().unwrap().clear();
        wait_until(|| !seen.lock().unwrap().is_empty());
        source.stop();

        let frames = seen.lock().unwrap();
        assert!(frames.iter().all(|f| f.epoch() == 1 && f.data() == [2]));
        assert_eq!(source.device_id(), Some("back"));
    }

    #[test]
    fn test_switch_hook_runs_before_old_device_is_released() {
        let discovery = FakeDiscovery::new(both_cameras(), 1000);
        let opened = discovery.opened.clone();
        let released = discovery.released.clone();
        let mut source =
            CameraFrameSource::new(Box::new(discovery), DeviceSelector::default(), CameraPosition::Front)
                .unwrap();
        let (handler, seen) = collecting_handler(FrameDelivery::Accepted);
        source.start(handler).unwrap();
        wait_until(|| !seen.lock().unwrap().is_empty());

        let at_hook = Arc::new(Mutex::new(None));
        let record = at_hook.clone();
        let (opened_in_hook, released_in_hook) = (opened.clone(), released.clone());
        source
            .switch_position(CameraPosition::Back, &move |_: u64| {
                *record.lock().unwrap() = Some((
                    opened_in_hook.lock().unwrap().clone(),
                    released_in_hook.lock().unwrap().clone(),
                ));
            })
            .unwrap();
        source.stop();

        let (opened_then, released_then) = at_hook.lock().unwrap().take().unwrap();
        assert_eq!(opened_then, vec!["front".to_string()]);
        assert!(released_then.is_empty());
        assert_eq!(*released.lock().unwrap(), vec!["front".to_string()]);

        // Front frames keep epoch 0; only the back camera delivers epoch 1.
        let frames = seen.lock().unwrap();
        assert!(frames.iter().all(|f| f.data() == [f.epoch() as u8 + 1]));
    }

    #[test]
    fn test_switch_without_target_device_is_noop() {
        let discovery = FakeDiscovery::new(vec![descriptor("front", CameraPosition::Front)], 1000);
        let mut source =
            CameraFrameSource::new(Box::new(discovery), DeviceSelector::default(), CameraPosition::Front)
                .unwrap();
        let (handler, seen) = collecting_handler(FrameDelivery::Accepted);
        source.start(handler).unwrap();

        let hook_called = Arc::new(AtomicBool::new(false));
        let flag = hook_called.clone();
        let result =
            source.switch_position(CameraPosition::Back, &move |_: u64| flag.store(true, Ordering::SeqCst));

        assert!(matches!(result, Err(CaptureError::NoDeviceAvailable(CameraPosition::Back))));
        assert!(!hook_called.load(Ordering::SeqCst));
        assert_eq!(source.position(), CameraPosition::Front);
        assert_eq!(source.epoch(), 0);
        assert!(source.is_running());

        seen.lock().unwrap().clear();
        wait_until(|| !seen.lock().unwrap().is_empty());
        source.stop();
    }

    #[test]
    fn test_switch_open_failure_restores_previous_camera() {
        let discovery = FakeDiscovery::new(both_cameras(), 1000);
        discovery.fail_open.lock().unwrap().push("back".into());
        let opened = discovery.opened.clone();
        let mut source =
            CameraFrameSource::new(Box::new(discovery), DeviceSelector::default(), CameraPosition::Front)
                .unwrap();
        let (handler, seen) = collecting_handler(FrameDelivery::Accepted);
        source.start(handler).unwrap();
        wait_until(|| !seen.lock().unwrap().is_empty());

        let hook_epoch = Arc::new(AtomicU64::new(0));
        let hook_seen = hook_epoch.clone();
        let result = source
            .switch_position(CameraPosition::Back, &move |e: u64| hook_seen.store(e, Ordering::SeqCst));

        assert!(matches!(result, Err(CaptureError::DeviceOpen { ref id, .. }) if id == "back"));
        assert_eq!(hook_epoch.load(Ordering::SeqCst), 1);
        assert_eq!(source.position(), CameraPosition::Front);
        assert_eq!(source.device_id(), Some("front"));
        assert!(source.is_running());
        assert_eq!(*opened.lock().unwrap(), vec!["front".to_string(), "front".to_string()]);

        // The restored camera delivers under the new epoch.
        seen.lock().unwrap().clear();
        wait_until(|| !seen.lock().unwrap().is_empty());
        source.stop();
        assert!(seen.lock().unwrap().iter().all(|f| f.epoch() == 1 && f.data() == [1]));
    }

    #[test]
    fn test_switch_reopen_failure_returns_original_error() {
        let discovery = FakeDiscovery::new(both_cameras(), 1000);
        let fail_open = discovery.fail_open.clone();
        let mut source =
            CameraFrameSource::new(Box::new(discovery), DeviceSelector::default(), CameraPosition::Front)
                .unwrap();
        source.start(collecting_handler(FrameDelivery::Accepted).0).unwrap();
        fail_open.lock().unwrap().extend(["front".to_string(), "back".to_string()]);

        let result = source.switch_position(CameraPosition::Back, &|_: u64| {});

        assert!(matches!(result, Err(CaptureError::DeviceOpen { ref id, .. }) if id == "back"));
        assert_eq!(source.device_id(), None);
        assert!(!source.is_running());
        assert_eq!(source.position(), CameraPosition::Front);
    }

    #[test]
    fn test_start_again_after_end_of_stream() {
        let discovery = FakeDiscovery::new(both_cameras(), 2);
        let mut source =
            CameraFrameSource::new(Box::new(discovery), DeviceSelector::default(), CameraPosition::Front)
                .unwrap();
        let (handler, seen) = collecting_handler(FrameDelivery::Accepted);
        source.start(handler).unwrap();

        wait_until(|| seen.lock().unwrap().len() == 2);
        wait_until(|| !source.is_running());

        let (handler, _) = collecting_handler(FrameDelivery::Accepted);
        assert!(source.start(handler).is_ok());
        source.stop();
        assert_eq!(source.device_id(), Some("front"));
    }

    #[test]
    fn test_switch_while_stopped_stays_stopped() {
        let discovery = FakeDiscovery::new(both_cameras(), 10);
        let mut source =
            CameraFrameSource::new(Box::new(discovery), DeviceSelector::default(), CameraPosition::Front)
                .unwrap();
        source.switch_position(CameraPosition::Back, &|_: u64| {}).unwrap();
        assert!(!source.is_running());
        assert_eq!(source.device_id(), Some("back"));
    }

    #[test]
    fn test_frames_are_normalized_to_upright() {
        let mut rotated = descriptor("front", CameraPosition::Front);
        rotated.orientation = Orientation::new(Rotation::Clockwise90, true);

        struct WideDevice;
        impl CaptureDevice for WideDevice {
            fn next_frame(&mut self) -> Result<Option<RawFrame>, CaptureError> {
                std::thread::sleep(Duration::from_millis(1));
                Ok(Some(RawFrame::new(vec![1, 2, 3, 4, 5, 6], 3, 2, PixelFormat::Gray8)))
            }
        }
        struct OneDeviceDiscovery(DeviceDescriptor);
        impl DeviceDiscovery for OneDeviceDiscovery {
            fn devices(&self) -> Vec<DeviceDescriptor> {
                vec![self.0.clone()]
            }
            fn open(
                &mut self,
                _descriptor: &DeviceDescriptor,
            ) -> Result<Box<dyn CaptureDevice>, CaptureError> {
                Ok(Box::new(WideDevice))
            }
        }

        let mut source = CameraFrameSource::new(
            Box::new(OneDeviceDiscovery(rotated)),
            DeviceSelector::default(),
            CameraPosition::Front,
        )
        .unwrap();
        let (handler, seen) = collecting_handler(FrameDelivery::Accepted);
        source.start(handler).unwrap();
        wait_until(|| !seen.lock().unwrap().is_empty());
        source.stop();

        let frames = seen.lock().unwrap();
        assert_eq!(frames[0].width(), 2);
        assert_eq!(frames[0].height(), 3);
        assert_eq!(frames[0].data(), &[1, 4, 2, 5, 3, 6]);
    }
}
