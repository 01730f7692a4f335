use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::constants::names::CHANNEL_TYPES;

pub trait StrExt {
    /// if the string starts with `c`, returns the rest of the string after it
    fn split_prefix(&self, c: char) -> Option<(char, &str)>;

    /// whether the string looks like a channel name, i.e. starts with a channel type character
    fn is_channel_name(&self) -> bool;
}

impl StrExt for str {
    fn split_prefix(&self, c: char) -> Option<(char, &str)> {
        self.strip_prefix(c).map(|rest| (c, rest))
    }

    fn is_channel_name(&self) -> bool {
        self.chars()
            .next()
            .is_some_and(|first| CHANNEL_TYPES.contains(&first))
    }
}

pub trait MutexExt<T> {
    /// locks the mutex, ignoring poisoning. none of the guarded values in this crate can be left
    /// in an inconsistent state by a panic halfway through an update.
    fn lock_unpoisoned(&self) -> MutexGuard<'_, T>;
}

impl<T> MutexExt<T> for Mutex<T> {
    fn lock_unpoisoned(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names() {
        assert!("#rust".is_channel_name());
        assert!("&local".is_channel_name());
        assert!(!"nick".is_channel_name());
        assert!(!"".is_channel_name());
    }

    #[test]
    fn split_prefix() {
        assert_eq!(":server".split_prefix(':'), Some((':', "server")));
        assert_eq!("server".split_prefix(':'), None);
    }
}
