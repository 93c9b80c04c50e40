//! Remote-scoped message routing through the bridge.

use crate::support::{settle, wait_for};
use device_abi::{
    DeliveryScope, DeviceError, InputDevice, InputHook, ManagerId, Message, MessageBody,
    MulticoreDevice, MulticoreHook, NotifyData, NotifyEvent,
};
use framework::Framework;
use parking_lot::Mutex;
use std::sync::Arc;

struct CapturingLink {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MulticoreDevice for CapturingLink {
    fn name(&self) -> &str {
        "capturing-link"
    }
    fn init(&mut self, _hook: MulticoreHook) -> Result<(), DeviceError> {
        Ok(())
    }
    fn start(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
    fn send(&mut self, frame: &[u8]) -> Result<(), DeviceError> {
        self.sent.lock().push(frame.to_vec());
        Ok(())
    }
    fn deinit(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Input device counting notify deliveries, to prove the local receiver was
/// skipped.
struct ObservingInput {
    notifies: Arc<Mutex<usize>>,
}

impl InputDevice for ObservingInput {
    fn name(&self) -> &str {
        "observing-input"
    }
    fn init(&mut self, _hook: InputHook) -> Result<(), DeviceError> {
        Ok(())
    }
    fn deinit(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
    fn start(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
    fn stop(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
    fn input_notify(&mut self, _event: &NotifyEvent) -> Result<(), DeviceError> {
        *self.notifies.lock() += 1;
        Ok(())
    }
}

#[test]
fn remote_scoped_notify_bridges_and_skips_local_delivery() {
    let mut fwk = Framework::new();

    let notifies = Arc::new(Mutex::new(0));
    fwk.register_input(Box::new(ObservingInput {
        notifies: Arc::clone(&notifies),
    }))
    .unwrap();

    let sent = Arc::new(Mutex::new(Vec::new()));
    fwk.register_multicore(Box::new(CapturingLink {
        sent: Arc::clone(&sent),
    }))
    .unwrap();

    let running = fwk.start().unwrap();
    settle();

    let payload: Arc<[u8]> = Arc::from(&[0xA5u8; 32][..]);
    running
        .post(
            ManagerId::Input,
            Message::bridged(
                MessageBody::InputNotify(NotifyData {
                    dev_id: 0,
                    event: NotifyEvent::Raw(Arc::clone(&payload)),
                }),
                DeliveryScope::Remote,
                ManagerId::Input,
            ),
        )
        .unwrap();

    wait_for("bridge send", || !sent.lock().is_empty());
    settle();

    let frames = sent.lock();
    assert_eq!(frames.len(), 1, "exactly one bridged send");
    // Contiguous header + payload: the wire header, the raw-event tag, and
    // the 32 payload bytes.
    assert_eq!(frames[0].len(), wire::HEADER_LEN + 1 + 32);

    let decoded = wire::decode(&frames[0]).unwrap();
    assert_eq!(decoded.scope, DeliveryScope::Local, "peer must not re-bridge");
    match decoded.body {
        MessageBody::InputNotify(notify) => {
            assert_eq!(notify.event, NotifyEvent::Raw(payload));
        }
        other => panic!("unexpected body {other:?}"),
    }

    // The local input manager's devices never saw the event.
    assert_eq!(*notifies.lock(), 0);

    running.shutdown();
}
