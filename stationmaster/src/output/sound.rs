use std::fmt;
use std::sync::Arc;

/// Cues for the audio layer. Emitted as they happen during a tick or a
/// command; the receiver decides how, and whether, to play them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SoundEvent {
    Arriving,
    Braking,
    Leaving,
    Stopped,
    Switch,
}

pub type SoundLogger = Arc<dyn Fn(SoundEvent) + Send + Sync>;

/// Shared receiver of sound cues.
#[derive(Clone)]
pub struct SoundSink(SoundLogger);

impl SoundSink {
    pub fn new<F: Fn(SoundEvent) + Send + Sync + 'static>(f: F) -> Self {
        SoundSink(Arc::new(f))
    }

    pub fn silent() -> Self {
        SoundSink::new(|_| {})
    }

    pub fn play(&self, event: SoundEvent) {
        (self.0)(event)
    }
}

impl Default for SoundSink {
    fn default() -> Self {
        SoundSink::silent()
    }
}

impl fmt::Debug for SoundSink {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SoundSink")
    }
}

/// A sink that stores every cue, for inspection.
pub fn recorder() -> (SoundSink, Arc<std::sync::Mutex<Vec<SoundEvent>>>) {
    let log = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink_log = log.clone();
    let sink = SoundSink::new(move |e| {
        if let Ok(mut l) = sink_log.lock() {
            l.push(e);
        }
    });
    (sink, log)
}
