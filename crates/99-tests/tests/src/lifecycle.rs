//! Low-power shutdown and config persistence scenarios.

use crate::support::{settle, wait_for};
use config_store::{ConfigStore, LogLevel, FWK_VERSION};
use device_abi::{FrameDescriptor, PixelFormat};
use framework::Framework;
use mock_hal::ScriptedCamera;
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;

fn camera_descriptor() -> FrameDescriptor {
    FrameDescriptor::packed(8, 8, PixelFormat::Gray8, PixelFormat::Gray8)
}

#[test]
fn lpm_pre_sleep_deinits_cameras_in_registration_order() {
    let mut fwk = Framework::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    for tag in 0..2u8 {
        let camera = ScriptedCamera::new(camera_descriptor(), vec![vec![0; 64]])
            .with_deinit_log(Arc::clone(&log), tag);
        fwk.register_camera(Box::new(camera)).unwrap();
    }

    let running = fwk.start().unwrap();
    settle();

    running.lpm_pre_enter_sleep();
    wait_for("camera deinit broadcast", || log.lock().len() == 2);
    assert_eq!(&*log.lock(), &[0, 1], "registration order");

    running.shutdown();
}

#[test]
fn config_survives_reboot_with_matching_version() {
    let flash = TempDir::new().unwrap();

    {
        let store = ConfigStore::open(flash.path()).unwrap();
        store.set_log_level(LogLevel::Debug).unwrap();
        let fwk = Framework::new().with_config(store);
        let running = fwk.start().unwrap();
        running.shutdown();
    }

    // Reboot: re-run the boot sequence over the same flash.
    let store = ConfigStore::open(flash.path()).unwrap();
    assert_eq!(store.log_level(), LogLevel::Debug);
    assert_eq!(store.metadata().fwk_version, FWK_VERSION);
}
