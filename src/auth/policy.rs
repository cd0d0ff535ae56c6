// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction policies.
//!
//! A [`Policy`] describes which transactions a flow accepts: action names and
//! count, the contract they must target, the shape of each authorization
//! list and the permissions it may use. [`Policy::validate`] checks a decoded
//! transaction against it and extracts the account the flow acts for.
//!
//! ## Built-in flows
//!
//! | Policy | Actions | Subject |
//! |--------|---------|---------|
//! | [`Policy::auth`] | exactly one allowed action | `actions[0].authorization[0]` |
//! | [`Policy::push`] | `validate` by the co-signer, then identical user actions | `actions[1].authorization[0]` |
//! | [`Policy::register`] | one `reguser` authorized by `[cosigner, user]` | `actions[0].authorization[1]` |

use crate::blockchain::codec::{Action, Transaction};
use crate::blockchain::name::{is_valid_account_name, Name};
use crate::blockchain::signing::CosignerIdentity;

/// Action name exempt from the contract account check.
pub const TRANSFER_ACTION: Name = Name::from_static("transfer");

/// Leading action the co-signer authorizes on push flows.
pub const VALIDATE_ACTION: Name = Name::from_static("validate");

/// Registration action.
pub const REGUSER_ACTION: Name = Name::from_static("reguser");

/// Permissions a user may sign with.
pub const ACTIVE_PERMISSION: Name = Name::from_static("active");
pub const OWNER_PERMISSION: Name = Name::from_static("owner");

/// Reasons a transaction is rejected by a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("context-free or extension data present")]
    ContextFreeData,

    #[error("wrong action count")]
    WrongActionCount,

    #[error("different actions found")]
    DifferentActions,

    #[error("unsupported action")]
    UnsupportedAction,

    #[error("wrong action account")]
    WrongActionAccount,

    #[error("wrong leading action")]
    WrongLeadingAction,

    #[error("wrong authorization")]
    WrongAuthorization,

    #[error("wrong permissions")]
    WrongPermissions,
}

/// A fixed action that must open the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadingAction {
    pub account: Name,
    pub name: Name,
    pub actor: Name,
    pub permission: Name,
}

/// Accepted action layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionShape {
    /// Exactly this many actions.
    Exactly(usize),
    /// The leading action followed by one or more actions sharing a name.
    Led(LeadingAction),
}

/// Acceptance rules for one flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub allowed_actions: Vec<Name>,
    pub shape: ActionShape,
    /// Account every action must target, unless its name is exempt.
    pub required_account: Option<Name>,
    pub exempt_actions: Vec<Name>,
    /// `(authorization index, actor)` pairs that must match exactly.
    pub fixed_actors: Vec<(usize, Name)>,
    pub min_authorizations: usize,
    pub max_authorizations: Option<usize>,
    /// Permissions every authorization entry of a user action may use.
    pub permissions: Vec<Name>,
    /// `(action index, authorization index)` of the acting account.
    pub subject: (usize, usize),
}

/// A transaction that passed its policy, with the account it acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTx {
    pub transaction: Transaction,
    pub actor: Name,
    pub permission: Name,
}

impl Policy {
    /// Single-action authentication flow. `transfer` may target any token
    /// contract; every other action must target `contract`.
    pub fn auth(contract: Name, actions: Vec<Name>) -> Self {
        Self {
            allowed_actions: actions,
            shape: ActionShape::Exactly(1),
            required_account: Some(contract),
            exempt_actions: vec![TRANSFER_ACTION],
            fixed_actors: Vec::new(),
            min_authorizations: 1,
            max_authorizations: None,
            permissions: default_permissions(),
            subject: (0, 0),
        }
    }

    /// Co-signed push flow: a `validate` action authorized by the co-signer
    /// followed by user actions that all share one allowed name.
    pub fn push(cosigner: &CosignerIdentity, actions: Vec<Name>) -> Self {
        Self {
            allowed_actions: actions,
            shape: ActionShape::Led(LeadingAction {
                account: cosigner.contract,
                name: VALIDATE_ACTION,
                actor: cosigner.account,
                permission: cosigner.permission,
            }),
            required_account: Some(cosigner.contract),
            exempt_actions: vec![TRANSFER_ACTION],
            fixed_actors: Vec::new(),
            min_authorizations: 1,
            max_authorizations: None,
            permissions: default_permissions(),
            subject: (1, 0),
        }
    }

    /// Account registration: one `reguser` action on the co-signer account,
    /// authorized by exactly `[cosigner, user]`.
    pub fn register(cosigner: &CosignerIdentity) -> Self {
        Self {
            allowed_actions: vec![REGUSER_ACTION],
            shape: ActionShape::Exactly(1),
            required_account: Some(cosigner.account),
            exempt_actions: Vec::new(),
            fixed_actors: vec![(0, cosigner.account)],
            min_authorizations: 2,
            max_authorizations: Some(2),
            permissions: default_permissions(),
            subject: (0, 1),
        }
    }

    /// Check `tx` against this policy, short-circuiting on the first failure.
    pub fn validate(&self, tx: Transaction) -> Result<ValidatedTx, PolicyError> {
        if !tx.context_free_actions.is_empty() || !tx.transaction_extensions.is_empty() {
            return Err(PolicyError::ContextFreeData);
        }

        let user_actions = self.user_actions(&tx.actions)?;

        if user_actions
            .iter()
            .any(|a| !self.allowed_actions.contains(&a.name))
        {
            return Err(PolicyError::UnsupportedAction);
        }

        if let Some(account) = self.required_account {
            let wrong = user_actions
                .iter()
                .any(|a| a.account != account && !self.exempt_actions.contains(&a.name));
            if wrong {
                return Err(PolicyError::WrongActionAccount);
            }
        }

        if let ActionShape::Led(leading) = &self.shape {
            check_leading(&tx.actions, leading)?;
        }

        for action in &user_actions {
            self.check_authorization(action)?;
        }

        let (action_index, auth_index) = self.subject;
        let level = tx
            .actions
            .get(action_index)
            .and_then(|a| a.authorization.get(auth_index))
            .copied()
            .ok_or(PolicyError::WrongAuthorization)?;

        Ok(ValidatedTx {
            transaction: tx,
            actor: level.actor,
            permission: level.permission,
        })
    }

    /// Actions subject to the name, account, and authorization rules.
    fn user_actions<'a>(&self, actions: &'a [Action]) -> Result<Vec<&'a Action>, PolicyError> {
        match &self.shape {
            ActionShape::Exactly(count) => {
                if actions.len() != *count {
                    return Err(PolicyError::WrongActionCount);
                }
                Ok(actions.iter().collect())
            }
            ActionShape::Led(leading) => {
                if actions.len() < 2 {
                    return Err(PolicyError::WrongActionCount);
                }
                let user: Vec<&Action> = actions.iter().filter(|a| a.name != leading.name).collect();
                let Some(first) = user.first() else {
                    return Err(PolicyError::WrongActionCount);
                };
                if user.iter().any(|a| a.name != first.name) {
                    return Err(PolicyError::DifferentActions);
                }
                Ok(user)
            }
        }
    }

    fn check_authorization(&self, action: &Action) -> Result<(), PolicyError> {
        let auth = &action.authorization;
        if auth.len() < self.min_authorizations.max(1)
            || self.max_authorizations.is_some_and(|max| auth.len() > max)
        {
            return Err(PolicyError::WrongAuthorization);
        }

        for (index, level) in auth.iter().enumerate() {
            match self.fixed_actors.iter().find(|(i, _)| *i == index) {
                Some((_, actor)) if level.actor != *actor => {
                    return Err(PolicyError::WrongAuthorization)
                }
                Some(_) => {}
                None if !is_valid_account_name(&level.actor.to_string()) => {
                    return Err(PolicyError::WrongAuthorization)
                }
                None => {}
            }
        }

        if auth
            .iter()
            .any(|level| !self.permissions.contains(&level.permission))
        {
            return Err(PolicyError::WrongPermissions);
        }

        Ok(())
    }
}

fn default_permissions() -> Vec<Name> {
    vec![ACTIVE_PERMISSION, OWNER_PERMISSION]
}

fn check_leading(actions: &[Action], leading: &LeadingAction) -> Result<(), PolicyError> {
    let first = &actions[0];
    let repeated = actions[1..].iter().any(|a| a.name == leading.name);
    if first.name != leading.name || first.account != leading.account || repeated {
        return Err(PolicyError::WrongLeadingAction);
    }

    match first.authorization.first() {
        Some(level) if level.actor == leading.actor && level.permission == leading.permission => {
            Ok(())
        }
        _ => Err(PolicyError::WrongAuthorization),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::codec::tests::{action, arb_action, arb_transaction, name, transaction};
    use crate::blockchain::codec::Extension;
    use proptest::prelude::*;

    fn cosigner() -> CosignerIdentity {
        CosignerIdentity {
            account: name("cosigner"),
            permission: name("active"),
            contract: name("gateway"),
        }
    }

    fn push_policy() -> Policy {
        Policy::push(&cosigner(), vec![name("usertos"), name("transfer")])
    }

    fn validate_action() -> Action {
        action("gateway", "validate", &[("cosigner", "active")])
    }

    #[test]
    fn constants_match_runtime_packing() {
        assert_eq!(TRANSFER_ACTION, name("transfer"));
        assert_eq!(VALIDATE_ACTION, name("validate"));
        assert_eq!(REGUSER_ACTION, name("reguser"));
        assert_eq!(ACTIVE_PERMISSION, name("active"));
        assert_eq!(OWNER_PERMISSION, name("owner"));
    }

    #[test]
    fn auth_accepts_single_contract_action() {
        let policy = Policy::auth(name("gateway"), vec![name("verify")]);
        let tx = transaction(vec![action("gateway", "verify", &[("alice", "active")])]);

        let validated = policy.validate(tx).unwrap();
        assert_eq!(validated.actor, name("alice"));
        assert_eq!(validated.permission, name("active"));
    }

    #[test]
    fn auth_lets_transfer_target_any_contract() {
        let policy = Policy::auth(name("gateway"), vec![name("transfer")]);
        let tx = transaction(vec![action("eosio.token", "transfer", &[("alice", "owner")])]);
        assert!(policy.validate(tx).is_ok());
    }

    #[test]
    fn auth_rejections() {
        let policy = Policy::auth(name("gateway"), vec![name("verify")]);

        let two = transaction(vec![
            action("gateway", "verify", &[("alice", "active")]),
            action("gateway", "verify", &[("alice", "active")]),
        ]);
        assert_eq!(policy.validate(two), Err(PolicyError::WrongActionCount));

        let other = transaction(vec![action("gateway", "steal", &[("alice", "active")])]);
        assert_eq!(policy.validate(other), Err(PolicyError::UnsupportedAction));

        let account = transaction(vec![action("evil", "verify", &[("alice", "active")])]);
        assert_eq!(policy.validate(account), Err(PolicyError::WrongActionAccount));

        let perm = transaction(vec![action("gateway", "verify", &[("alice", "custom")])]);
        assert_eq!(policy.validate(perm), Err(PolicyError::WrongPermissions));

        let none = transaction(vec![action("gateway", "verify", &[])]);
        assert_eq!(policy.validate(none), Err(PolicyError::WrongAuthorization));
    }

    #[test]
    fn auth_checks_every_permission() {
        let policy = Policy::auth(name("gateway"), vec![name("verify")]);

        let subject_custom = transaction(vec![action(
            "gateway",
            "verify",
            &[("alice", "custom"), ("bob", "active")],
        )]);
        assert_eq!(policy.validate(subject_custom), Err(PolicyError::WrongPermissions));

        let trailing_custom = transaction(vec![action(
            "gateway",
            "verify",
            &[("alice", "active"), ("bob", "custom")],
        )]);
        assert_eq!(policy.validate(trailing_custom), Err(PolicyError::WrongPermissions));

        let both_whitelisted = transaction(vec![action(
            "gateway",
            "verify",
            &[("alice", "owner"), ("bob", "active")],
        )]);
        assert_eq!(policy.validate(both_whitelisted).unwrap().permission, name("owner"));
    }

    #[test]
    fn context_free_and_extension_data_rejected() {
        let policy = Policy::auth(name("gateway"), vec![name("verify")]);

        let mut tx = transaction(vec![action("gateway", "verify", &[("alice", "active")])]);
        tx.context_free_actions = vec![action("gateway", "verify", &[])];
        assert_eq!(policy.validate(tx), Err(PolicyError::ContextFreeData));

        let mut tx = transaction(vec![action("gateway", "verify", &[("alice", "active")])]);
        tx.transaction_extensions = vec![Extension { kind: 1, data: vec![0] }];
        assert_eq!(policy.validate(tx), Err(PolicyError::ContextFreeData));
    }

    proptest! {
        #[test]
        fn context_free_or_extension_data_always_rejected(
            mut tx in arb_transaction(),
            extra in arb_action(),
            use_extension in any::<bool>(),
            kind in any::<u16>(),
        ) {
            if use_extension {
                tx.transaction_extensions.push(Extension { kind, data: Vec::new() });
            } else {
                tx.context_free_actions.push(extra);
            }

            for policy in [
                Policy::auth(name("gateway"), vec![name("verify")]),
                push_policy(),
                Policy::register(&cosigner()),
            ] {
                prop_assert_eq!(policy.validate(tx.clone()), Err(PolicyError::ContextFreeData));
            }
        }
    }

    #[test]
    fn push_accepts_validate_then_identical_actions() {
        let tx = transaction(vec![
            validate_action(),
            action("eosio.token", "transfer", &[("alice", "active")]),
            action("eosio.token", "transfer", &[("alice", "active")]),
        ]);

        let validated = push_policy().validate(tx).unwrap();
        assert_eq!(validated.actor, name("alice"));
    }

    #[test]
    fn push_rejects_different_action_names() {
        let tx = transaction(vec![
            action("gateway", "usertos", &[("alice", "active")]),
            action("eosio.token", "transfer", &[("alice", "active")]),
        ]);
        assert_eq!(push_policy().validate(tx), Err(PolicyError::DifferentActions));

        let tx = transaction(vec![
            validate_action(),
            action("gateway", "usertos", &[("alice", "active")]),
            action("eosio.token", "transfer", &[("alice", "active")]),
        ]);
        assert_eq!(push_policy().validate(tx), Err(PolicyError::DifferentActions));
    }

    #[test]
    fn push_requires_validate_first() {
        let tx = transaction(vec![validate_action()]);
        assert_eq!(push_policy().validate(tx), Err(PolicyError::WrongActionCount));

        let tx = transaction(vec![
            action("gateway", "usertos", &[("alice", "active")]),
            validate_action(),
        ]);
        assert_eq!(push_policy().validate(tx), Err(PolicyError::WrongLeadingAction));

        let tx = transaction(vec![
            action("gateway", "usertos", &[("alice", "active")]),
            action("gateway", "usertos", &[("alice", "active")]),
        ]);
        assert_eq!(push_policy().validate(tx), Err(PolicyError::WrongLeadingAction));

        let tx = transaction(vec![
            validate_action(),
            validate_action(),
            action("gateway", "usertos", &[("alice", "active")]),
        ]);
        assert_eq!(push_policy().validate(tx), Err(PolicyError::WrongLeadingAction));

        let tx = transaction(vec![
            action("other", "validate", &[("cosigner", "active")]),
            action("gateway", "usertos", &[("alice", "active")]),
        ]);
        assert_eq!(push_policy().validate(tx), Err(PolicyError::WrongLeadingAction));
    }

    #[test]
    fn push_leading_action_must_be_signed_by_cosigner() {
        let tx = transaction(vec![
            action("gateway", "validate", &[("mallory", "active")]),
            action("gateway", "usertos", &[("alice", "active")]),
        ]);
        assert_eq!(push_policy().validate(tx), Err(PolicyError::WrongAuthorization));

        let tx = transaction(vec![
            action("gateway", "validate", &[("cosigner", "owner")]),
            action("gateway", "usertos", &[("alice", "active")]),
        ]);
        assert_eq!(push_policy().validate(tx), Err(PolicyError::WrongAuthorization));
    }

    #[test]
    fn push_checks_every_user_permission() {
        let tx = transaction(vec![
            validate_action(),
            action("gateway", "usertos", &[("alice", "active"), ("bob", "custom")]),
        ]);
        assert_eq!(push_policy().validate(tx), Err(PolicyError::WrongPermissions));
    }

    #[test]
    fn register_accepts_cosigner_then_user() {
        let policy = Policy::register(&cosigner());
        let tx = transaction(vec![action(
            "cosigner",
            "reguser",
            &[("cosigner", "active"), ("newuser", "active")],
        )]);

        let validated = policy.validate(tx).unwrap();
        assert_eq!(validated.actor, name("newuser"));
    }

    #[test]
    fn register_rejects_wrong_first_actor() {
        let policy = Policy::register(&cosigner());
        let tx = transaction(vec![action(
            "cosigner",
            "reguser",
            &[("mallory", "active"), ("newuser", "active")],
        )]);
        assert_eq!(policy.validate(tx), Err(PolicyError::WrongAuthorization));
    }

    #[test]
    fn register_authorization_shape() {
        let policy = Policy::register(&cosigner());

        let one = transaction(vec![action("cosigner", "reguser", &[("cosigner", "active")])]);
        assert_eq!(policy.validate(one), Err(PolicyError::WrongAuthorization));

        let three = transaction(vec![action(
            "cosigner",
            "reguser",
            &[("cosigner", "active"), ("newuser", "active"), ("other", "active")],
        )]);
        assert_eq!(policy.validate(three), Err(PolicyError::WrongAuthorization));

        let perm = transaction(vec![action(
            "cosigner",
            "reguser",
            &[("cosigner", "active"), ("newuser", "custom")],
        )]);
        assert_eq!(policy.validate(perm), Err(PolicyError::WrongPermissions));

        let account = transaction(vec![action(
            "gateway",
            "reguser",
            &[("cosigner", "active"), ("newuser", "active")],
        )]);
        assert_eq!(policy.validate(account), Err(PolicyError::WrongActionAccount));
    }

    #[test]
    fn register_rejects_empty_user_account() {
        let policy = Policy::register(&cosigner());
        let mut tx = transaction(vec![action(
            "cosigner",
            "reguser",
            &[("cosigner", "active"), ("newuser", "active")],
        )]);
        tx.actions[0].authorization[1].actor = Name::default();
        assert_eq!(policy.validate(tx), Err(PolicyError::WrongAuthorization));
    }
}
