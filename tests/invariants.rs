//! Property tests: the count always mirrors the identity set.

use proptest::prelude::*;
use reaction_tracker::{
    Action, Channel, MemoryStorage, ReactionTracker, StorageAdapter, SubjectId, TrackerConfig,
};
use std::collections::HashSet;

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![Just(Action::Add), Just(Action::Remove)]
}

fn channel() -> impl Strategy<Value = Channel> {
    prop_oneof![Just(Channel::LIKE), Just(Channel::DISLIKE), Just(Channel::VOTE)]
}

proptest! {
    #[test]
    fn count_matches_reactors(ops in prop::collection::vec((action(), 0u8..8), 1..60)) {
        let tracker = ReactionTracker::new(
            MemoryStorage::with_subjects(["s"]),
            TrackerConfig::default(),
        );
        let subject = SubjectId::new("s");
        let mut model: HashSet<String> = HashSet::new();

        for (action, reactor) in ops {
            let reactor = format!("r{}", reactor);
            let state = tracker.apply(&subject, &Channel::LIKE, reactor.clone(), action).unwrap();

            match action {
                Action::Add => { model.insert(reactor); }
                Action::Remove => { model.remove(&reactor); }
            }

            prop_assert!(state.is_consistent());
            prop_assert_eq!(state.count(), model.len() as u64);

            let stored = tracker.storage().load(&subject, &Channel::LIKE).unwrap();
            prop_assert_eq!(&stored, &state);
        }
    }

    #[test]
    fn add_is_idempotent(reactors in prop::collection::vec(0u8..16, 0..20), extra in 0u8..16) {
        let tracker = ReactionTracker::new(
            MemoryStorage::with_subjects(["s"]),
            TrackerConfig::default(),
        );
        let subject = SubjectId::new("s");

        for r in reactors {
            tracker.add(&subject, &Channel::VOTE, format!("r{}", r)).unwrap();
        }

        let once = tracker.add(&subject, &Channel::VOTE, format!("r{}", extra)).unwrap();
        let twice = tracker.add(&subject, &Channel::VOTE, format!("r{}", extra)).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn channels_never_leak(ops in prop::collection::vec((channel(), action(), 0u8..6), 1..40)) {
        let tracker = ReactionTracker::new(
            MemoryStorage::with_subjects(["s"]),
            TrackerConfig::default(),
        );
        let subject = SubjectId::new("s");

        for (channel, action, reactor) in ops {
            let others: Vec<_> = [Channel::LIKE, Channel::DISLIKE, Channel::VOTE]
                .into_iter()
                .filter(|c| *c != channel)
                .map(|c| (c.clone(), tracker.state(&subject, &c).unwrap()))
                .collect();

            tracker.apply(&subject, &channel, format!("r{}", reactor), action).unwrap();

            for (other, before) in others {
                prop_assert_eq!(tracker.state(&subject, &other).unwrap(), before);
            }
        }
    }

    #[test]
    fn add_then_has_then_remove(reactor in "[a-z]{1,12}") {
        let tracker = ReactionTracker::new(
            MemoryStorage::with_subjects(["s"]),
            TrackerConfig::default(),
        );
        let subject = SubjectId::new("s");

        tracker.add(&subject, &Channel::LIKE, reactor.as_str()).unwrap();
        prop_assert!(tracker.has(&subject, &Channel::LIKE, reactor.as_str()).unwrap());

        tracker.remove(&subject, &Channel::LIKE, reactor.as_str()).unwrap();
        prop_assert!(!tracker.has(&subject, &Channel::LIKE, reactor.as_str()).unwrap());
    }
}
