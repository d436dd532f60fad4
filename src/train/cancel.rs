use std::sync::Arc;

use crossbeam::atomic::AtomicCell;

/// A flag another thread can raise to stop training before its next
/// iteration.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicCell<bool>>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load()
    }
}

#[test]
fn test_clones_share_state() {
    let token = CancellationToken::new();
    let handle = token.clone();
    assert!(!token.is_cancelled());

    std::thread::spawn(move || handle.cancel())
        .join()
        .unwrap();
    assert!(token.is_cancelled());
}
