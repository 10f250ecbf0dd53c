//! Mock camera SDK with trigger and streaming support.

use crate::common::{ErrorConfig, MockMode, MockRng};
use crate::pattern;
use gx_core::{
    DeviceBaseInfo, DeviceHandle, DeviceSdk, Feature, FrameStatus, IntParam, PixelFormat,
    RawFrameInfo, SdkError, SdkErrorKind, TriggerMode, TriggerSource,
};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Granularity of waits inside `dequeue_frame`.
const IDLE_POLL: Duration = Duration::from_millis(1);

// =============================================================================
// Configuration
// =============================================================================

/// Simulated camera description.
#[derive(Debug, Clone, Deserialize)]
pub struct MockDeviceConfig {
    /// Serial number reported by enumeration (default: "MOCK0001")
    #[serde(default = "default_serial")]
    pub serial_number: String,

    /// Model name (default: "MER-Mock")
    #[serde(default = "default_model")]
    pub model_name: String,

    /// Vendor name (default: "Mock Imaging")
    #[serde(default = "default_vendor")]
    pub vendor_name: String,

    /// Frame width in pixels (default: 640)
    #[serde(default = "default_width")]
    pub width: u32,

    /// Frame height in pixels (default: 480)
    #[serde(default = "default_height")]
    pub height: u32,

    /// Raw pixel format (default: mono8)
    #[serde(default = "default_pixel_format")]
    pub pixel_format: PixelFormat,

    /// Frame period in realistic mode (default: 33 ms)
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Reported payload size, overriding the size derived from the ROI
    #[serde(default)]
    pub payload_size: Option<i64>,

    /// Whether trigger mode and software trigger are implemented (default: true)
    #[serde(default = "default_true")]
    pub trigger_supported: bool,

    /// Fraction of frames delivered incomplete (0.0 to 1.0)
    #[serde(default)]
    pub frame_loss_rate: f64,

    /// Fraction of frames reported with half their byte count (0.0 to 1.0)
    #[serde(default)]
    pub truncated_frame_rate: f64,
}

fn default_serial() -> String {
    "MOCK0001".to_string()
}
fn default_model() -> String {
    "MER-Mock".to_string()
}
fn default_vendor() -> String {
    "Mock Imaging".to_string()
}
fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    480
}
fn default_pixel_format() -> PixelFormat {
    PixelFormat::Mono8
}
fn default_frame_interval_ms() -> u64 {
    33
}
fn default_true() -> bool {
    true
}

impl Default for MockDeviceConfig {
    fn default() -> Self {
        Self {
            serial_number: default_serial(),
            model_name: default_model(),
            vendor_name: default_vendor(),
            width: default_width(),
            height: default_height(),
            pixel_format: default_pixel_format(),
            frame_interval_ms: default_frame_interval_ms(),
            payload_size: None,
            trigger_supported: true,
            frame_loss_rate: 0.0,
            truncated_frame_rate: 0.0,
        }
    }
}

impl MockDeviceConfig {
    /// Device with the given serial number and default geometry.
    pub fn new(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            ..Self::default()
        }
    }

    /// Set the sensor resolution.
    #[must_use]
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the raw pixel format.
    #[must_use]
    pub fn pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    /// Set the frame period used in realistic mode.
    #[must_use]
    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Report `size` as the payload size.
    #[must_use]
    pub fn payload_size(mut self, size: i64) -> Self {
        self.payload_size = Some(size);
        self
    }

    /// Device without trigger features.
    #[must_use]
    pub fn without_trigger(mut self) -> Self {
        self.trigger_supported = false;
        self
    }

    /// Deliver this fraction of frames as incomplete.
    #[must_use]
    pub fn frame_loss_rate(mut self, rate: f64) -> Self {
        self.frame_loss_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Report this fraction of frames as shorter than their geometry.
    #[must_use]
    pub fn truncated_frame_rate(mut self, rate: f64) -> Self {
        self.truncated_frame_rate = rate.clamp(0.0, 1.0);
        self
    }

    fn frame_bytes(&self) -> Option<usize> {
        self.pixel_format.image_bytes(self.width, self.height)
    }

    fn base_info(&self) -> DeviceBaseInfo {
        DeviceBaseInfo {
            vendor_name: self.vendor_name.clone(),
            model_name: self.model_name.clone(),
            serial_number: self.serial_number.clone(),
            display_name: format!("{}({})", self.model_name, self.serial_number),
        }
    }
}

/// Mock SDK section of the application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MockSdkConfig {
    /// Frame pacing mode
    #[serde(default)]
    pub mode: MockMode,

    /// RNG seed for reproducible frame loss
    #[serde(default)]
    pub seed: Option<u64>,

    /// Simulated cameras in enumeration order
    #[serde(default)]
    pub devices: Vec<MockDeviceConfig>,
}

// =============================================================================
// MockSdkBuilder
// =============================================================================

/// Builder for [`MockSdk`].
#[derive(Debug, Default)]
pub struct MockSdkBuilder {
    devices: Vec<(MockDeviceConfig, ErrorConfig)>,
    mode: MockMode,
    sdk_errors: ErrorConfig,
    seed: Option<u64>,
}

impl MockSdkBuilder {
    /// Add a camera.
    #[must_use]
    pub fn device(mut self, config: MockDeviceConfig) -> Self {
        self.devices.push((config, ErrorConfig::none()));
        self
    }

    /// Add a camera whose calls go through `errors`.
    #[must_use]
    pub fn device_with_errors(mut self, config: MockDeviceConfig, errors: ErrorConfig) -> Self {
        self.devices.push((config, errors));
        self
    }

    /// Frame pacing mode.
    #[must_use]
    pub fn mode(mut self, mode: MockMode) -> Self {
        self.mode = mode;
        self
    }

    /// Error injection for library level calls (`enumerate_devices`, `open`).
    #[must_use]
    pub fn sdk_errors(mut self, errors: ErrorConfig) -> Self {
        self.sdk_errors = errors;
        self
    }

    /// RNG seed for frame loss.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Finish the builder.
    pub fn build(self) -> MockSdk {
        MockSdk {
            devices: self.devices,
            mode: self.mode,
            sdk_errors: self.sdk_errors,
            rng: Arc::new(MockRng::new(self.seed)),
            open_indices: Arc::new(Mutex::new(HashSet::new())),
            handles: Mutex::new(HashMap::new()),
        }
    }
}

// =============================================================================
// MockSdk
// =============================================================================

/// Simulated camera SDK.
///
/// Devices are opened by 1-based index in the order they were added. Each
/// index can be open at most once at a time, like a real USB/GigE camera.
///
/// # Example
///
/// ```rust,ignore
/// let sdk = MockSdk::builder()
///     .device(MockDeviceConfig::new("SN1").resolution(64, 48))
///     .build();
/// let handle = sdk.open(1)?;
/// ```
pub struct MockSdk {
    devices: Vec<(MockDeviceConfig, ErrorConfig)>,
    mode: MockMode,
    sdk_errors: ErrorConfig,
    rng: Arc<MockRng>,
    open_indices: Arc<Mutex<HashSet<u32>>>,
    handles: Mutex<HashMap<u32, Arc<MockDevice>>>,
}

impl MockSdk {
    /// Start building a mock SDK.
    pub fn builder() -> MockSdkBuilder {
        MockSdkBuilder::default()
    }

    /// Mock SDK with the given cameras in instant mode.
    pub fn with_devices(devices: impl IntoIterator<Item = MockDeviceConfig>) -> Self {
        devices
            .into_iter()
            .fold(Self::builder(), MockSdkBuilder::device)
            .build()
    }

    /// Build from the configuration file section.
    pub fn from_config(config: &MockSdkConfig) -> Self {
        let mut builder = config
            .devices
            .iter()
            .cloned()
            .fold(Self::builder().mode(config.mode), MockSdkBuilder::device);
        builder.seed = config.seed;
        builder.build()
    }

    /// The handle most recently opened at `index`, for inspection in tests.
    pub fn device(&self, index: u32) -> Option<Arc<MockDevice>> {
        self.handles.lock().get(&index).cloned()
    }

    /// Number of configured cameras.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

impl DeviceSdk for MockSdk {
    fn enumerate_devices(&self, _timeout: Duration) -> Result<Vec<DeviceBaseInfo>, SdkError> {
        self.sdk_errors.check_operation("enumerate_devices")?;
        Ok(self.devices.iter().map(|(config, _)| config.base_info()).collect())
    }

    fn open(&self, index: u32) -> Result<Arc<dyn DeviceHandle>, SdkError> {
        self.sdk_errors.check_operation("open")?;

        let (config, errors) = index
            .checked_sub(1)
            .and_then(|slot| self.devices.get(slot as usize))
            .ok_or_else(|| {
                SdkError::new(
                    "open",
                    SdkErrorKind::InvalidParameter,
                    format!("No device at index {}", index),
                )
            })?;
        errors.check_operation("open")?;

        if !self.open_indices.lock().insert(index) {
            return Err(SdkError::new(
                "open",
                SdkErrorKind::InvalidCall,
                format!("Device {} is already open", index),
            ));
        }

        let device = Arc::new(MockDevice::new(
            index,
            config.clone(),
            self.mode,
            errors.clone(),
            Arc::clone(&self.rng),
            Arc::clone(&self.open_indices),
        ));
        self.handles.lock().insert(index, Arc::clone(&device));
        info!(index, serial = %config.serial_number, "Mock device opened");
        Ok(device)
    }
}

// =============================================================================
// MockDevice
// =============================================================================

#[derive(Debug)]
struct DeviceState {
    trigger_mode: TriggerMode,
    trigger_source: TriggerSource,
    stream_started: Instant,
    next_frame_at: Instant,
}

/// An open simulated camera.
///
/// Frames are generated on demand inside `dequeue_frame`. With trigger mode
/// on, one frame is released per software trigger; hardware line sources
/// never fire.
pub struct MockDevice {
    index: u32,
    config: MockDeviceConfig,
    mode: MockMode,
    errors: ErrorConfig,
    rng: Arc<MockRng>,
    open_indices: Arc<Mutex<HashSet<u32>>>,
    opened: AtomicBool,
    streaming: AtomicBool,
    state: Mutex<DeviceState>,
    pending_triggers: AtomicU32,
    buffer_count: AtomicUsize,
    frame_counter: AtomicU64,
    stream_starts: AtomicU32,
}

impl MockDevice {
    fn new(
        index: u32,
        config: MockDeviceConfig,
        mode: MockMode,
        errors: ErrorConfig,
        rng: Arc<MockRng>,
        open_indices: Arc<Mutex<HashSet<u32>>>,
    ) -> Self {
        let now = Instant::now();
        Self {
            index,
            config,
            mode,
            errors,
            rng,
            open_indices,
            opened: AtomicBool::new(true),
            streaming: AtomicBool::new(false),
            state: Mutex::new(DeviceState {
                trigger_mode: TriggerMode::Off,
                trigger_source: TriggerSource::Software,
                stream_started: now,
                next_frame_at: now,
            }),
            pending_triggers: AtomicU32::new(0),
            buffer_count: AtomicUsize::new(0),
            frame_counter: AtomicU64::new(0),
            stream_starts: AtomicU32::new(0),
        }
    }

    /// Whether the handle has not been closed.
    pub fn is_open(&self) -> bool {
        self.opened.load(Ordering::Acquire)
    }

    /// Whether streaming is on.
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Last buffer count set by the host (0 if never set).
    pub fn buffer_count(&self) -> usize {
        self.buffer_count.load(Ordering::Acquire)
    }

    /// Frames delivered since open.
    pub fn frames_delivered(&self) -> u64 {
        self.frame_counter.load(Ordering::Acquire)
    }

    /// Number of times streaming was started.
    pub fn stream_starts(&self) -> u32 {
        self.stream_starts.load(Ordering::Acquire)
    }

    /// Current trigger source.
    pub fn trigger_source(&self) -> TriggerSource {
        self.state.lock().trigger_source
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.config.frame_interval_ms)
    }

    fn ensure_open(&self, operation: &'static str) -> Result<(), SdkError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(SdkError::new(operation, SdkErrorKind::InvalidHandle, "Device is closed"))
        }
    }

    fn ensure_trigger(&self, operation: &'static str) -> Result<(), SdkError> {
        if self.config.trigger_supported {
            Ok(())
        } else {
            Err(SdkError::new(
                operation,
                SdkErrorKind::NotImplemented,
                "Trigger is not implemented by this device",
            ))
        }
    }

    /// Block until a frame is due or `deadline` passes.
    fn wait_for_frame(&self, deadline: Instant) -> bool {
        let (trigger_mode, trigger_source) = {
            let state = self.state.lock();
            (state.trigger_mode, state.trigger_source)
        };

        if trigger_mode == TriggerMode::On {
            loop {
                if trigger_source == TriggerSource::Software
                    && self
                        .pending_triggers
                        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                        .is_ok()
                {
                    return true;
                }
                if !self.is_streaming() || Instant::now() >= deadline {
                    return false;
                }
                std::thread::sleep(IDLE_POLL);
            }
        }

        match self.mode {
            MockMode::Instant => true,
            MockMode::Realistic => {
                let due = {
                    let mut state = self.state.lock();
                    let due = state.next_frame_at;
                    if due > deadline {
                        None
                    } else {
                        let now = Instant::now();
                        // Skip missed periods instead of bursting to catch up
                        state.next_frame_at = (due + self.frame_interval()).max(now);
                        Some(due)
                    }
                };
                match due {
                    Some(due) => {
                        let now = Instant::now();
                        if due > now {
                            std::thread::sleep(due - now);
                        }
                        true
                    }
                    None => {
                        let now = Instant::now();
                        if deadline > now {
                            std::thread::sleep(deadline - now);
                        }
                        false
                    }
                }
            }
        }
    }
}

impl DeviceHandle for MockDevice {
    fn get_int(&self, param: IntParam) -> Result<i64, SdkError> {
        self.ensure_open("get_int")?;
        self.errors.check_operation("get_int")?;
        let value = match param {
            IntParam::PayloadSize => match self.config.payload_size {
                Some(size) => size,
                None => self.config.frame_bytes().map_or(0, |bytes| bytes as i64),
            },
            IntParam::Width => i64::from(self.config.width),
            IntParam::Height => i64::from(self.config.height),
        };
        Ok(value)
    }

    fn is_implemented(&self, feature: Feature) -> Result<bool, SdkError> {
        self.ensure_open("is_implemented")?;
        Ok(match feature {
            Feature::ColorFilter => self.config.pixel_format.is_bayer(),
            Feature::TriggerMode | Feature::TriggerSoftware => self.config.trigger_supported,
        })
    }

    fn trigger_mode(&self) -> Result<TriggerMode, SdkError> {
        self.ensure_open("trigger_mode")?;
        self.ensure_trigger("trigger_mode")?;
        Ok(self.state.lock().trigger_mode)
    }

    fn set_trigger_mode(&self, mode: TriggerMode) -> Result<(), SdkError> {
        self.ensure_open("set_trigger_mode")?;
        self.ensure_trigger("set_trigger_mode")?;
        self.errors.check_operation("set_trigger_mode")?;
        self.state.lock().trigger_mode = mode;
        self.pending_triggers.store(0, Ordering::Release);
        debug!(index = self.index, ?mode, "Mock trigger mode set");
        Ok(())
    }

    fn set_trigger_source(&self, source: TriggerSource) -> Result<(), SdkError> {
        self.ensure_open("set_trigger_source")?;
        self.ensure_trigger("set_trigger_source")?;
        self.errors.check_operation("set_trigger_source")?;
        self.state.lock().trigger_source = source;
        debug!(index = self.index, ?source, "Mock trigger source set");
        Ok(())
    }

    fn send_software_trigger(&self) -> Result<(), SdkError> {
        const OP: &str = "send_software_trigger";
        self.ensure_open(OP)?;
        self.ensure_trigger(OP)?;
        self.errors.check_operation(OP)?;
        if self.state.lock().trigger_mode != TriggerMode::On {
            return Err(SdkError::new(OP, SdkErrorKind::InvalidCall, "Trigger mode is off"));
        }
        // A trigger while not streaming is lost, as on hardware
        if self.is_streaming() {
            self.pending_triggers.fetch_add(1, Ordering::AcqRel);
        }
        Ok(())
    }

    fn set_buffer_count(&self, count: usize) -> Result<(), SdkError> {
        const OP: &str = "set_buffer_count";
        self.ensure_open(OP)?;
        self.errors.check_operation(OP)?;
        if self.is_streaming() {
            return Err(SdkError::new(
                OP,
                SdkErrorKind::InvalidCall,
                "Cannot resize buffers while streaming",
            ));
        }
        if count == 0 {
            return Err(SdkError::new(
                OP,
                SdkErrorKind::InvalidParameter,
                "Buffer count must be positive",
            ));
        }
        self.buffer_count.store(count, Ordering::Release);
        Ok(())
    }

    fn stream_on(&self) -> Result<(), SdkError> {
        const OP: &str = "stream_on";
        self.ensure_open(OP)?;
        self.errors.check_operation(OP)?;
        if self.streaming.swap(true, Ordering::AcqRel) {
            return Err(SdkError::new(OP, SdkErrorKind::InvalidCall, "Already streaming"));
        }
        {
            let mut state = self.state.lock();
            let now = Instant::now();
            state.stream_started = now;
            state.next_frame_at = now + self.frame_interval();
        }
        self.stream_starts.fetch_add(1, Ordering::AcqRel);
        debug!(index = self.index, "Mock stream on");
        Ok(())
    }

    fn stream_off(&self) -> Result<(), SdkError> {
        self.ensure_open("stream_off")?;
        self.errors.check_operation("stream_off")?;
        self.streaming.store(false, Ordering::Release);
        self.pending_triggers.store(0, Ordering::Release);
        debug!(index = self.index, "Mock stream off");
        Ok(())
    }

    fn dequeue_frame(
        &self,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<RawFrameInfo, SdkError> {
        const OP: &str = "dequeue_frame";
        self.ensure_open(OP)?;
        if !self.is_streaming() {
            return Err(SdkError::new(OP, SdkErrorKind::InvalidCall, "Stream is off"));
        }
        if let Err(err) = self.errors.check_operation(OP) {
            if err.is_timeout() {
                std::thread::sleep(timeout.min(IDLE_POLL));
            }
            return Err(err);
        }

        if !self.wait_for_frame(Instant::now() + timeout) {
            return Err(SdkError::timeout(OP));
        }

        let needed = self.config.frame_bytes().ok_or_else(|| {
            SdkError::new(OP, SdkErrorKind::InvalidParameter, "Frame size overflows")
        })?;
        if buffer.len() < needed {
            return Err(SdkError::new(
                OP,
                SdkErrorKind::InvalidParameter,
                format!("Buffer of {} bytes cannot hold {} byte frame", buffer.len(), needed),
            ));
        }

        let frame_id = self.frame_counter.fetch_add(1, Ordering::AcqRel);
        let mut len = pattern::fill_frame(
            self.config.pixel_format,
            self.config.width,
            self.config.height,
            frame_id,
            buffer,
        );
        if self.rng.should_fail(self.config.truncated_frame_rate) {
            len /= 2;
        }
        let status = if self.rng.should_fail(self.config.frame_loss_rate) {
            FrameStatus::Incomplete
        } else {
            FrameStatus::Complete
        };
        let timestamp_ns = self.state.lock().stream_started.elapsed().as_nanos() as u64;

        Ok(RawFrameInfo {
            frame_id,
            timestamp_ns,
            width: self.config.width,
            height: self.config.height,
            pixel_format: self.config.pixel_format,
            len,
            status,
        })
    }

    fn close(&self) -> Result<(), SdkError> {
        self.ensure_open("close")?;
        self.errors.check_operation("close")?;
        self.streaming.store(false, Ordering::Release);
        self.opened.store(false, Ordering::Release);
        self.open_indices.lock().remove(&self.index);
        info!(index = self.index, "Mock device closed");
        Ok(())
    }
}

impl std::fmt::Debug for MockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDevice")
            .field("index", &self.index)
            .field("serial_number", &self.config.serial_number)
            .field("opened", &self.is_open())
            .field("streaming", &self.is_streaming())
            .finish()
    }
}
