//! Identity resolution.
//!
//! Free functions mapping a [`UserRef`] to the canonical address and, when
//! assigned, the registry id. Resolution is first-match-wins over the
//! reference kind; only `RegID` references consult the secondary index.

use lib_crypto::KeyId;

use crate::ids::{RegId, UserRef, REG_ID_SIZE};
use crate::view::AccountView;

/// Canonical address for a reference.
///
/// `Null` never resolves. A `RegID` resolves only if the secondary index
/// holds an assignment, i.e. a registration or lazy-assignment path
/// executed earlier.
pub fn resolve_key_id<V: AccountView + ?Sized>(view: &V, user: &UserRef) -> Option<KeyId> {
    match user {
        UserRef::Null => None,
        UserRef::Key(key_id) => Some(*key_id),
        UserRef::Pub(pub_key) => Some(pub_key.key_id()),
        UserRef::Reg(reg_id) => view.reg_index_get(reg_id),
    }
}

/// Registry id for a reference, if the underlying account has one.
pub fn resolve_reg_id<V: AccountView + ?Sized>(view: &V, user: &UserRef) -> Option<RegId> {
    match user {
        UserRef::Null => None,
        UserRef::Reg(reg_id) => view.reg_index_get(reg_id).map(|_| *reg_id),
        UserRef::Pub(pub_key) => view.load_account(&pub_key.key_id())?.reg_id,
        UserRef::Key(key_id) => view.load_account(key_id)?.reg_id,
    }
}

/// Address for a raw principal blob emitted by the contract runtime:
/// six bytes name a registry id, twenty name an address directly.
pub fn key_id_from_blob<V: AccountView + ?Sized>(view: &V, blob: &[u8]) -> Option<KeyId> {
    match blob.len() {
        REG_ID_SIZE => {
            let reg_id = RegId::from_slice(blob)?;
            view.reg_index_get(&reg_id)
        }
        lib_crypto::KEY_ID_SIZE => KeyId::from_slice(blob),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::view::MemAccountView;
    use lib_crypto::pub_key_for_secret;

    #[test]
    fn null_never_resolves() {
        let view = MemAccountView::new();
        assert_eq!(resolve_key_id(&view, &UserRef::Null), None);
        assert_eq!(resolve_reg_id(&view, &UserRef::Null), None);
    }

    #[test]
    fn pub_key_resolves_without_state() {
        let view = MemAccountView::new();
        let pk = pub_key_for_secret(&[1u8; 32]).unwrap();
        assert_eq!(resolve_key_id(&view, &UserRef::Pub(pk)), Some(pk.key_id()));
    }

    #[test]
    fn reg_id_resolves_only_after_assignment() {
        use crate::view::AccountView as _;

        let mut view = MemAccountView::new();
        let reg_id = RegId::new(10, 0);
        assert_eq!(resolve_key_id(&view, &UserRef::Reg(reg_id)), None);

        let key_id = KeyId::new([9u8; 20]);
        view.save_account_info(reg_id, key_id, Account::new(key_id))
            .unwrap();
        assert_eq!(resolve_key_id(&view, &UserRef::Reg(reg_id)), Some(key_id));
        assert_eq!(resolve_reg_id(&view, &UserRef::Reg(reg_id)), Some(reg_id));
    }

    #[test]
    fn blob_resolution_handles_both_widths() {
        use crate::view::AccountView as _;

        let mut view = MemAccountView::new();
        let reg_id = RegId::new(7, 3);
        let key_id = KeyId::new([4u8; 20]);
        view.save_account_info(reg_id, key_id, Account::new(key_id))
            .unwrap();

        assert_eq!(key_id_from_blob(&view, &reg_id.to_vec6()), Some(key_id));
        assert_eq!(key_id_from_blob(&view, key_id.as_ref()), Some(key_id));
        assert_eq!(key_id_from_blob(&view, &[0u8; 7]), None);
    }
}
