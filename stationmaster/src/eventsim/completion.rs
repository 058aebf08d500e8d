use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use crate::error::EngineError;

/// Single-value handle resolved once a queued command has been applied.
#[derive(Debug)]
pub struct Completion<T> {
    receiver: Receiver<Result<T, EngineError>>,
}

/// Fulfilling side of a `Completion`.
pub type Completer<T> = Sender<Result<T, EngineError>>;

pub fn completion<T>() -> (Completer<T>, Completion<T>) {
    let (tx, rx) = channel();
    (tx, Completion { receiver: rx })
}

impl<T> Completion<T> {
    /// Blocks until the command has been applied.
    pub fn wait(self) -> Result<T, EngineError> {
        match self.receiver.recv() {
            Ok(result) => result,
            Err(_) => Err(EngineError::Disconnected),
        }
    }

    /// The result if it is already there.
    pub fn try_get(&self) -> Option<Result<T, EngineError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(EngineError::Disconnected)),
        }
    }
}
