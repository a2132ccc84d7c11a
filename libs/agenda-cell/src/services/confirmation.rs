use serde::Serialize;

/// The "discard unsaved changes?" prompt. It can only be open while the form
/// is dirty and idle, and closes itself as soon as either stops being true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardConfirmation {
    #[default]
    Closed,
    Open,
}

impl DiscardConfirmation {
    pub fn is_open(self) -> bool {
        self == DiscardConfirmation::Open
    }

    /// Returns whether the prompt is now showing.
    pub fn request(&mut self, dirty: bool, submitting: bool) -> bool {
        if dirty && !submitting {
            *self = DiscardConfirmation::Open;
        }
        self.is_open()
    }

    pub fn close(&mut self) {
        *self = DiscardConfirmation::Closed;
    }

    pub fn reconcile(&mut self, dirty: bool, submitting: bool) {
        if !dirty || submitting {
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_opens_when_dirty_and_idle() {
        let mut prompt = DiscardConfirmation::default();

        assert!(!prompt.request(false, false));
        assert!(!prompt.request(true, true));
        assert!(prompt.request(true, false));
    }

    #[test]
    fn test_auto_closes() {
        let mut prompt = DiscardConfirmation::Open;
        prompt.reconcile(true, false);
        assert!(prompt.is_open());

        prompt.reconcile(true, true);
        assert!(!prompt.is_open());

        let mut prompt = DiscardConfirmation::Open;
        prompt.reconcile(false, false);
        assert!(!prompt.is_open());
    }
}
