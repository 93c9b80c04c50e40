//! Microphone → front-end → wake word → command, end to end.

use crate::support::{settle, wait_for};
use crossbeam_channel::{unbounded, Sender};
use device_abi::{
    AsrDetectStatus, AsrResult, DeviceError, InferenceResult, InferenceSource, NotifyEvent,
    OutputDeviceType, OutputEventHandler, UiUpdate,
};
use framework::Framework;
use manager_voice::asr::{AsrSession, AsrVoiceDevice, LANG_ENGLISH, DEMO_COFFEE_MACHINE};
use mock_hal::{NullOutput, PassThroughAfe, PushInput, ScriptedCommand, ScriptedWakeWord};
use std::sync::Arc;

struct ResultSink {
    tx: Sender<(InferenceSource, AsrResult)>,
}

impl OutputEventHandler for ResultSink {
    fn inference_complete(
        &mut self,
        source: InferenceSource,
        result: &InferenceResult,
    ) -> Result<UiUpdate, DeviceError> {
        if let InferenceResult::Voice(result) = result {
            let _ = self.tx.send((source, *result));
        }
        Ok(UiUpdate::default())
    }
}

#[test]
fn wake_word_then_command_detection() {
    let mut fwk = Framework::new();

    let input = PushInput::new();
    let injector = input.injector();
    fwk.register_input(Box::new(input)).unwrap();

    let afe = PassThroughAfe::new();
    let feedback = afe.feedback();
    fwk.register_audio_processing(Box::new(afe)).unwrap();

    let session = AsrSession::new(
        Box::new(ScriptedWakeWord::new().trigger(LANG_ENGLISH, b"hey-coffee", 480)),
        Box::new(ScriptedCommand::new().trigger(
            LANG_ENGLISH,
            DEMO_COFFEE_MACHINE,
            b"small",
            7,
        )),
    );
    fwk.register_voice_algo(Box::new(AsrVoiceDevice::new(session)))
        .unwrap();

    let output_dev = fwk
        .register_output(Box::new(NullOutput::new("led", OutputDeviceType::Other)))
        .unwrap();
    let (tx, results) = unbounded();
    fwk.register_output_event_handler(output_dev, Box::new(ResultSink { tx }))
        .unwrap();

    let running = fwk.start().unwrap();
    settle();

    // A non-matching block detects nothing.
    injector.audio(Arc::from(&b"background-noise"[..])).unwrap();
    settle();
    assert!(results.try_recv().is_err());

    // The wake word transitions into the command window and reports the
    // detected language to the output manager.
    injector.audio(Arc::from(&b"hey-coffee"[..])).unwrap();
    let (source, result) = results
        .recv_timeout(std::time::Duration::from_secs(5))
        .expect("wake-word result");
    assert_eq!(source, InferenceSource::Voice);
    assert_eq!(result.status, AsrDetectStatus::WakeWordDetected);
    assert_eq!(result.language, LANG_ENGLISH);

    // The front-end hears back how long the utterance was.
    wait_for("afe feedback", || {
        feedback
            .lock()
            .iter()
            .any(|event| matches!(event, NotifyEvent::AsrToAfeFeedback { utterance_len: 480 }))
    });

    // Command id 7 ("Small") inside the session window.
    injector.audio(Arc::from(&b"small"[..])).unwrap();
    let (_, result) = results
        .recv_timeout(std::time::Duration::from_secs(5))
        .expect("command result");
    assert_eq!(result.status, AsrDetectStatus::CommandDetected);
    assert_eq!(result.keyword_id, 7);

    running.shutdown();
}
