/// Conversation merge engine
use crate::conversation::Conversation;
use crate::model::{InboxItem, ThreadSnapshot};

/// Where `add_message` put a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Same id already present, contents replaced at this index
    Replaced(usize),
    /// Newer than everything, now at index 0
    Front,
    /// Older than everything, now last
    Back,
    /// Inserted between existing messages at this index
    Spliced(usize),
}

/// Outcome of reconciling one thread snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

/// Merge one message into a list sorted by timestamp, newest first.
///
/// A known id is overwritten where it stands, even when its new timestamp
/// breaks the ordering. Equal timestamps land after the existing run of
/// equal entries; a message not strictly newer than any entry goes last.
pub fn add_message(items: &mut Vec<InboxItem>, msg: InboxItem) -> Placement {
    if let Some(pos) = items.iter().position(|m| m.id == msg.id) {
        items[pos] = msg;
        return Placement::Replaced(pos);
    }

    let (head, tail) = match (items.first(), items.last()) {
        (Some(head), Some(tail)) => (head.timestamp, tail.timestamp),
        _ => {
            items.push(msg);
            return Placement::Front;
        }
    };

    if msg.timestamp > head {
        items.insert(0, msg);
        Placement::Front
    } else if msg.timestamp < tail {
        items.push(msg);
        Placement::Back
    } else {
        match items.iter().position(|m| m.timestamp < msg.timestamp) {
            Some(pos) => {
                items.insert(pos, msg);
                Placement::Spliced(pos)
            }
            None => {
                items.push(msg);
                Placement::Back
            }
        }
    }
}

/// Reconcile a snapshot into the conversation list.
///
/// Unknown threads are prepended, known ones absorb the snapshot in place.
pub fn upsert_conversation(conversations: &mut Vec<Conversation>, snapshot: ThreadSnapshot) -> Upsert {
    match conversations.iter_mut().find(|c| c.id == snapshot.id) {
        Some(existing) => {
            existing.absorb(snapshot);
            Upsert::Updated
        }
        None => {
            conversations.insert(0, Conversation::from_snapshot(snapshot));
            Upsert::Inserted
        }
    }
}

impl Conversation {
    /// Field-level merge of a fresh snapshot.
    ///
    /// Overwritten: every server-owned field, flags and participants
    /// included. Preserved: the message list and local pagination state.
    /// The snapshot's messages are then folded in one by one.
    pub fn absorb(&mut self, snapshot: ThreadSnapshot) {
        let ThreadSnapshot {
            id,
            v2_id,
            items,
            title,
            users,
            left_users,
            admin_user_ids,
            approval_required,
            pending,
            pending_score,
            viewer_id,
            last_activity_at,
            named,
            muted,
            spam,
            is_pin,
            is_group,
            is_verified_thread,
            is_close_friend_thread,
            thread_type,
            inviter,
            has_older,
            has_newer,
            archived,
            last_seen_at,
            newest_cursor,
            oldest_cursor,
        } = snapshot;

        self.id = id;
        self.v2_id = v2_id;
        self.title = title;
        self.users = users;
        self.left_users = left_users;
        self.admin_user_ids = admin_user_ids;
        self.approval_required = approval_required;
        self.pending = pending;
        self.pending_score = pending_score;
        self.viewer_id = viewer_id;
        self.last_activity_at = last_activity_at;
        self.named = named;
        self.muted = muted;
        self.spam = spam;
        self.is_pin = is_pin;
        self.is_group = is_group;
        self.is_verified_thread = is_verified_thread;
        self.is_close_friend_thread = is_close_friend_thread;
        self.thread_type = thread_type;
        self.inviter = inviter;
        self.has_older = has_older;
        self.has_newer = has_newer;
        self.archived = archived;
        self.last_seen_at = last_seen_at;
        self.newest_cursor = newest_cursor;
        self.oldest_cursor = oldest_cursor;

        for msg in items {
            self.add_message(msg);
        }
    }

    pub fn add_message(&mut self, msg: InboxItem) -> Placement {
        add_message(&mut self.items, msg)
    }
}
