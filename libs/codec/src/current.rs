//! # Current History Cell
//!
//! ## Purpose
//!
//! Thread-local handoff slot for the history record of the message a thread
//! is currently processing. Each thread gets its own cell - records are
//! never shared across threads through it, which keeps the record
//! single-writer without any locking.
//!
//! The cell initializes lazily on first access with a record that appends
//! source details on read (the relaying default), configured from the
//! environment. `replace` is last-writer-wins; replacing with `None` clears
//! the slot and the next access re-initializes it.

use std::cell::RefCell;

use tracing::trace;
use types::MessageHistory;

use crate::config::CodecConfig;

thread_local! {
    static CURRENT: RefCell<Option<MessageHistory>> = const { RefCell::new(None) };
}

/// Runs `f` against this thread's current history record, initializing the
/// record lazily on first use.
pub fn with_current<R>(f: impl FnOnce(&mut MessageHistory) -> R) -> R {
    CURRENT.with(|cell| {
        let mut slot = cell.borrow_mut();
        let record = slot.get_or_insert_with(default_record);
        f(record)
    })
}

/// Replaces this thread's current record, returning the previous one.
/// `None` clears the slot; the next [`with_current`] re-initializes it.
pub fn replace(record: Option<MessageHistory>) -> Option<MessageHistory> {
    CURRENT.with(|cell| std::mem::replace(&mut *cell.borrow_mut(), record))
}

fn default_record() -> MessageHistory {
    trace!("initializing thread-local history record");
    let mut record = CodecConfig::from_env().new_history();
    record.set_add_source_details(true);
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_initializes_lazily_with_relaying_default() {
        replace(None);
        let add_details = with_current(|record| record.add_source_details());
        assert!(add_details);
    }

    #[test]
    fn clear_then_get_recreates_a_fresh_record() {
        replace(None);
        with_current(|record| record.add_source(1, 0xff).unwrap());
        assert_eq!(with_current(|record| record.sources()), 1);

        replace(None);
        assert_eq!(with_current(|record| record.sources()), 0);
    }

    #[test]
    fn replace_is_last_writer_wins() {
        replace(None);
        let mut seeded = MessageHistory::new();
        seeded.add_source(7, 0x70).unwrap();
        let previous = replace(Some(seeded));
        assert!(previous.is_none());

        assert_eq!(with_current(|record| record.last_source_id()), Some(7));

        let taken = replace(None).unwrap();
        assert_eq!(taken.last_source_index(), Some(0x70));
    }

    #[test]
    fn cells_are_per_thread() {
        replace(None);
        with_current(|record| record.add_source(1, 1).unwrap());
        let other = std::thread::spawn(|| with_current(|record| record.sources()))
            .join()
            .unwrap();
        assert_eq!(other, 0);
        assert_eq!(with_current(|record| record.sources()), 1);
    }
}
