//! Six-slot one-time-code input.
//!
//! Models the digit boxes of a verification form. Manual entry and paste
//! both end in [`OtpInput::take_submission`], which hands out a completed
//! code exactly once until the input is edited again.

use std::fmt;

use crate::validation::OTP_CODE_LENGTH;

#[derive(Clone, Default, PartialEq, Eq)]
pub struct OtpInput {
    slots: [Option<char>; OTP_CODE_LENGTH],
    submitted: bool,
}

impl OtpInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills one slot. Returns `false` for a non-digit or out-of-range index,
    /// leaving the input untouched.
    pub fn enter_digit(&mut self, index: usize, ch: char) -> bool {
        if index >= OTP_CODE_LENGTH || !ch.is_ascii_digit() {
            return false;
        }
        self.slots[index] = Some(ch);
        self.submitted = false;
        true
    }

    /// Clears `index`, or the previous slot when `index` is already empty.
    /// Returns the slot that should receive focus.
    pub fn backspace(&mut self, index: usize) -> usize {
        let index = index.min(OTP_CODE_LENGTH - 1);
        self.submitted = false;

        if self.slots[index].is_some() {
            self.slots[index] = None;
            index
        } else if index > 0 {
            self.slots[index - 1] = None;
            index - 1
        } else {
            0
        }
    }

    /// Fills every slot from a pasted code, atomically.
    ///
    /// Surrounding whitespace is ignored. Anything other than exactly six
    /// digits is rejected and the slots keep their previous contents.
    pub fn paste(&mut self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.len() != OTP_CODE_LENGTH || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }

        for (slot, ch) in self.slots.iter_mut().zip(trimmed.chars()) {
            *slot = Some(ch);
        }
        self.submitted = false;
        true
    }

    pub fn clear(&mut self) {
        self.slots = [None; OTP_CODE_LENGTH];
        self.submitted = false;
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn digits(&self) -> [Option<char>; OTP_CODE_LENGTH] {
        self.slots
    }

    /// The full code once every slot is filled.
    pub fn code(&self) -> Option<String> {
        self.slots.iter().copied().collect()
    }

    /// Returns the completed code once per completion.
    pub fn take_submission(&mut self) -> Option<String> {
        if self.submitted {
            return None;
        }
        let code = self.code()?;
        self.submitted = true;
        Some(code)
    }
}

impl fmt::Debug for OtpInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filled = self.slots.iter().filter(|s| s.is_some()).count();
        f.debug_struct("OtpInput")
            .field("filled", &filled)
            .field("submitted", &self.submitted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(code: &str) -> OtpInput {
        let mut input = OtpInput::new();
        for (i, ch) in code.chars().enumerate() {
            assert!(input.enter_digit(i, ch));
        }
        input
    }

    #[test]
    fn test_manual_entry_submits_once() {
        let mut input = typed("123456");
        assert_eq!(input.take_submission(), Some("123456".to_string()));
        assert_eq!(input.take_submission(), None);
    }

    #[test]
    fn test_incomplete_input_does_not_submit() {
        let mut input = typed("12345");
        assert!(!input.is_complete());
        assert_eq!(input.take_submission(), None);
        assert_eq!(input.code(), None);
    }

    #[test]
    fn test_non_digit_rejected() {
        let mut input = OtpInput::new();
        assert!(!input.enter_digit(0, 'a'));
        assert!(!input.enter_digit(6, '1'));
        assert_eq!(input.digits(), [None; 6]);
    }

    #[test]
    fn test_paste_fills_all_slots() {
        let mut input = typed("99");
        assert!(input.paste("  654321\n"));
        assert_eq!(input.code(), Some("654321".to_string()));
        assert_eq!(input.take_submission(), Some("654321".to_string()));
    }

    #[test]
    fn test_invalid_paste_leaves_slots_untouched() {
        let mut input = typed("12");
        assert!(!input.paste("12 3456"));
        assert!(!input.paste("1234567"));
        assert!(!input.paste("abcdef"));
        assert_eq!(input.digits()[..2], [Some('1'), Some('2')]);
        assert_eq!(input.digits()[2], None);
    }

    #[test]
    fn test_edit_after_submission_rearms() {
        let mut input = typed("123456");
        assert!(input.take_submission().is_some());

        // Editing re-arms: the user is entering a new attempt.
        assert!(input.paste("123456"));
        assert_eq!(input.take_submission(), Some("123456".to_string()));
        assert_eq!(input.take_submission(), None);
    }

    #[test]
    fn test_backspace_moves_focus() {
        let mut input = typed("123");
        assert_eq!(input.backspace(2), 2);
        assert_eq!(input.digits()[2], None);
        assert_eq!(input.backspace(2), 1);
        assert_eq!(input.digits()[1], None);
        assert_eq!(input.backspace(0), 0);
    }

    #[test]
    fn test_clear_rearms() {
        let mut input = typed("123456");
        input.take_submission();
        input.clear();
        assert_eq!(input.digits(), [None; 6]);
        assert!(input.paste("123456"));
        assert!(input.take_submission().is_some());
    }
}
