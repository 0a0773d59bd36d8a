//! Wire-shape tests for the shared model types.

mod support;

use envault_cloud::{
    Account, Member, MemberRole, MemberStatus, SecretRecord, Workspace, WorkspaceKeyRecord,
    WorkspaceKind,
};
use envault_crypto::{generate_workspace_key, open_workspace_key};
use support::*;
use uuid::Uuid;

#[test]
fn workspace_kind_uses_lowercase_wire_names() {
    assert_eq!(
        serde_json::to_string(&WorkspaceKind::Personal).unwrap(),
        "\"personal\""
    );
    assert_eq!(
        serde_json::to_string(&WorkspaceKind::Shared).unwrap(),
        "\"shared\""
    );
}

#[test]
fn member_role_uses_snake_case_wire_names() {
    assert_eq!(
        serde_json::to_string(&MemberRole::ReadOnly).unwrap(),
        "\"read_only\""
    );
    assert_eq!(serde_json::to_string(&MemberRole::Owner).unwrap(), "\"owner\"");
}

#[test]
fn workspace_json_roundtrip() {
    let workspace = Workspace {
        id: Uuid::new_v4(),
        kind: WorkspaceKind::Shared,
        key_version: 7,
    };

    let json = serde_json::to_string(&workspace).unwrap();
    let restored: Workspace = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.id, workspace.id);
    assert_eq!(restored.kind, workspace.kind);
    assert_eq!(restored.key_version, 7);
}

#[test]
fn account_json_roundtrip() {
    let account = Account {
        id: Uuid::new_v4(),
        email: "a@example.com".to_string(),
        salt: "ab".repeat(32),
        encrypted_private_key: "AAAA".to_string(),
        public_key: "BBBB".to_string(),
    };

    let json = serde_json::to_string(&account).unwrap();
    let restored: Account = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.id, account.id);
    assert_eq!(restored.email, account.email);
    assert_eq!(restored.salt, account.salt);
}

#[test]
fn member_json_roundtrip() {
    let member = Member {
        workspace_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        role: MemberRole::Admin,
        status: MemberStatus::Invited,
    };

    let json = serde_json::to_string(&member).unwrap();
    let restored: Member = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.role, MemberRole::Admin);
    assert_eq!(restored.status, MemberStatus::Invited);
}

#[test]
fn secret_record_json_roundtrip() {
    let key = generate_workspace_key();
    let project_id = Uuid::new_v4();
    let json = make_secret_json(project_id, "API_KEY", "sk-42", &key, 2);

    let record: SecretRecord = serde_json::from_value(json).unwrap();
    assert_eq!(record.project_id, project_id);
    assert_eq!(record.key, "API_KEY");
    assert_eq!(record.key_version, 2);
}

#[test]
fn key_record_wire_form_unwraps() {
    let ctx = make_ctx("owner@example.com");
    let key = generate_workspace_key();

    let record = WorkspaceKeyRecord {
        workspace_id: Uuid::new_v4(),
        member_id: ctx.user_id,
        key_version: 1,
        wrapped_key: wrap_for_ctx(&key, &ctx),
    };

    // Through JSON and back, the sealed key still opens
    let json = serde_json::to_string(&record).unwrap();
    let restored: WorkspaceKeyRecord = serde_json::from_str(&json).unwrap();

    let sealed = restored.sealed_key().unwrap();
    assert_eq!(open_workspace_key(&sealed, &ctx.keypair.secret).unwrap(), key);
}

#[test]
fn malformed_wrapped_key_is_encoding_error() {
    let record = WorkspaceKeyRecord {
        workspace_id: Uuid::new_v4(),
        member_id: Uuid::new_v4(),
        key_version: 1,
        wrapped_key: "definitely not base64 !!!".to_string(),
    };

    assert!(record.sealed_key().is_err());
}
