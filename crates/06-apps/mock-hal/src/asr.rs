//! Scripted recognition engines.

use manager_voice::asr::{CommandEngine, WakeWordEngine, WakeWordHit};

/// Wake-word engine triggered by exact block contents per language.
pub struct ScriptedWakeWord {
    triggers: Vec<(u8, Vec<u8>, u32)>,
    resets: usize,
}

impl ScriptedWakeWord {
    /// An engine with no triggers.
    pub fn new() -> Self {
        Self {
            triggers: Vec::new(),
            resets: 0,
        }
    }

    /// Adds a trigger: blocks equal to `block` detect the wake word in
    /// `language` with the given utterance length.
    pub fn trigger(mut self, language: u8, block: &[u8], utterance_len: u32) -> Self {
        self.triggers.push((language, block.to_vec(), utterance_len));
        self
    }

    /// Number of resets seen (language-set changes).
    pub fn resets(&self) -> usize {
        self.resets
    }
}

impl Default for ScriptedWakeWord {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeWordEngine for ScriptedWakeWord {
    fn scan(&mut self, language: u8, block: &[u8]) -> Option<WakeWordHit> {
        self.triggers
            .iter()
            .find(|(lang, trigger, _)| *lang == language && trigger == block)
            .map(|(_, _, utterance_len)| WakeWordHit {
                utterance_len: *utterance_len,
            })
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}

/// Command engine triggered by exact block contents per (language, demo).
pub struct ScriptedCommand {
    triggers: Vec<(u8, u8, Vec<u8>, i32)>,
}

impl ScriptedCommand {
    /// An engine with no triggers.
    pub fn new() -> Self {
        Self {
            triggers: Vec::new(),
        }
    }

    /// Adds a trigger: blocks equal to `block` detect `keyword_id` in the
    /// given language and demo.
    pub fn trigger(mut self, language: u8, demo: u8, block: &[u8], keyword_id: i32) -> Self {
        self.triggers
            .push((language, demo, block.to_vec(), keyword_id));
        self
    }
}

impl Default for ScriptedCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandEngine for ScriptedCommand {
    fn scan(&mut self, language: u8, demo: u8, block: &[u8]) -> Option<i32> {
        self.triggers
            .iter()
            .find(|(lang, dm, trigger, _)| *lang == language && *dm == demo && trigger == block)
            .map(|(_, _, _, keyword_id)| *keyword_id)
    }
}
