// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status topics: routing and journaling
//!
//! - `TopicBus` routes serialized messages to subscribers by topic pattern
//! - `StatusJournal` keeps a JSONL audit trail of published snapshots
//! - `TopicPattern` matches ':'-separated topic names

mod bus;
mod journal;
mod subscription;

pub use bus::{BusMessage, MessageReceiver, MessageSender, TopicBus};
pub use journal::{JournalRecord, StatusJournal};
pub use subscription::{SubscriberId, Subscription, TopicPattern};
