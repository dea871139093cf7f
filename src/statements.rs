//! Typed identifiers for the statements kept in the compiled-statement cache.
//!
//! Every slot maps to exactly one SQL text for the lifetime of a connection.
//! Transaction control and config CRUD slots carry their own SQL; the
//! contact/chat/message slots are opaque keys whose SQL is supplied by the
//! caller that owns those tables.

/// A fixed logical identifier for one cached statement.
///
/// The first three variants are transaction control and must stay first, in
/// the order begin, rollback, commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatementSlot {
    BeginTransaction,
    RollbackTransaction,
    CommitTransaction,

    SelectConfigValue,
    InsertConfig,
    UpdateConfig,
    DeleteConfig,

    CountContacts,
    SelectContactById,
    SelectContactByAddr,
    InsertContact,
    UpdateContactName,

    CountChats,
    SelectChatList,
    SelectChatById,

    SelectChatContactIds,
    CountChatContacts,
    UpdateChatDraft,

    CountAssignedMessages,
    CountUnassignedMessages,
    SelectMessageIdByRfc724Mid,
    SelectMessageById,
    InsertMessage,
    InsertMessageRecipient,
}

impl StatementSlot {
    pub const ALL: [StatementSlot; 24] = [
        StatementSlot::BeginTransaction,
        StatementSlot::RollbackTransaction,
        StatementSlot::CommitTransaction,
        StatementSlot::SelectConfigValue,
        StatementSlot::InsertConfig,
        StatementSlot::UpdateConfig,
        StatementSlot::DeleteConfig,
        StatementSlot::CountContacts,
        StatementSlot::SelectContactById,
        StatementSlot::SelectContactByAddr,
        StatementSlot::InsertContact,
        StatementSlot::UpdateContactName,
        StatementSlot::CountChats,
        StatementSlot::SelectChatList,
        StatementSlot::SelectChatById,
        StatementSlot::SelectChatContactIds,
        StatementSlot::CountChatContacts,
        StatementSlot::UpdateChatDraft,
        StatementSlot::CountAssignedMessages,
        StatementSlot::CountUnassignedMessages,
        StatementSlot::SelectMessageIdByRfc724Mid,
        StatementSlot::SelectMessageById,
        StatementSlot::InsertMessage,
        StatementSlot::InsertMessageRecipient,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// SQL owned by this crate for the slot, `None` for caller-defined slots.
    #[must_use]
    pub fn builtin_sql(self) -> Option<&'static str> {
        match self {
            StatementSlot::BeginTransaction => Some("BEGIN;"),
            StatementSlot::RollbackTransaction => Some("ROLLBACK;"),
            StatementSlot::CommitTransaction => Some("COMMIT;"),
            StatementSlot::SelectConfigValue => {
                Some("SELECT value FROM config WHERE keyname=?1;")
            }
            StatementSlot::InsertConfig => {
                Some("INSERT INTO config (keyname, value) VALUES (?1, ?2);")
            }
            StatementSlot::UpdateConfig => Some("UPDATE config SET value=?2 WHERE keyname=?1;"),
            StatementSlot::DeleteConfig => Some("DELETE FROM config WHERE keyname=?1;"),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_transaction_control(self) -> bool {
        matches!(
            self,
            StatementSlot::BeginTransaction
                | StatementSlot::RollbackTransaction
                | StatementSlot::CommitTransaction
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_control_comes_first() {
        assert_eq!(StatementSlot::ALL[0], StatementSlot::BeginTransaction);
        assert_eq!(StatementSlot::ALL[1], StatementSlot::RollbackTransaction);
        assert_eq!(StatementSlot::ALL[2], StatementSlot::CommitTransaction);
        assert!(StatementSlot::ALL[..3].iter().all(|s| s.is_transaction_control()));
        assert!(!StatementSlot::ALL[3..].iter().any(|s| s.is_transaction_control()));
    }

    #[test]
    fn all_lists_each_slot_once_in_declaration_order() {
        let mut sorted = StatementSlot::ALL.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), StatementSlot::COUNT);
        assert_eq!(sorted, StatementSlot::ALL.to_vec());
    }

    #[test]
    fn only_control_and_config_slots_carry_sql() {
        let with_sql: Vec<_> = StatementSlot::ALL
            .iter()
            .filter(|s| s.builtin_sql().is_some())
            .collect();
        assert_eq!(with_sql.len(), 7);
        assert_eq!(StatementSlot::CountContacts.builtin_sql(), None);
    }
}
