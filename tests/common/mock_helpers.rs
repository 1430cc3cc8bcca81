//! Mock construction helpers

use crossbeam_channel::Sender;
use pixelbridge::device::ChannelController;
use pixelbridge::mapping::RangeDescriptor;
use pixelbridge::transport::{MockTransport, MockTransportHandle};
use pixelbridge::ChannelGeometry;

/// Small controller shape used across integration tests: 4 channels of 8 LEDs
pub fn test_geometry() -> ChannelGeometry {
    ChannelGeometry::new(8, 4, 3)
}

/// Create a started controller over a recording transport
pub fn create_test_controller(map: &[RangeDescriptor]) -> (ChannelController, MockTransportHandle) {
    let transport = MockTransport::new();
    let handle = transport.handle();
    let mut controller =
        ChannelController::new("generic", "test", test_geometry(), Box::new(transport), 64);
    controller.configure(map).expect("test mapping compiles");
    controller.start().expect("transfer task starts");
    (controller, handle)
}

/// Like [`create_test_controller`], but every commit waits for a gate token
pub fn create_gated_controller(
    map: &[RangeDescriptor],
) -> (ChannelController, MockTransportHandle, Sender<()>) {
    let (transport, gate) = MockTransport::new().with_gate();
    let handle = transport.handle();
    let mut controller =
        ChannelController::new("generic", "gated", test_geometry(), Box::new(transport), 64);
    controller.configure(map).expect("test mapping compiles");
    controller.start().expect("transfer task starts");
    (controller, handle, gate)
}

/// Poll until the pipeline is idle; returns `false` on timeout
pub fn wait_until_idle(controller: &ChannelController, timeout: std::time::Duration) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if controller.phase() == pixelbridge::PipelinePhase::Idle {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    false
}
