use super::*;
use time::macros::datetime;

// =============================================================================
// resolve_extension
// =============================================================================

#[test]
fn extension_from_content_type() {
    assert_eq!(resolve_extension(Some("image/jpeg"), None).unwrap(), ".jpg");
    assert_eq!(resolve_extension(Some("IMAGE/JPG"), None).unwrap(), ".jpg");
    assert_eq!(resolve_extension(Some(" image/png "), Some("x.webp")).unwrap(), ".png");
    assert_eq!(resolve_extension(Some("image/webp"), None).unwrap(), ".webp");
}

#[test]
fn extension_falls_back_to_file_name() {
    assert_eq!(resolve_extension(Some("application/octet-stream"), Some("photo.JPEG")).unwrap(), ".jpg");
    assert_eq!(resolve_extension(None, Some("a.b.png")).unwrap(), ".png");
    assert_eq!(resolve_extension(None, Some("x.webp")).unwrap(), ".webp");
}

#[test]
fn extension_unknown_or_unsupported() {
    assert!(matches!(resolve_extension(None, None), Err(StorageError::UnknownType)));
    assert!(matches!(resolve_extension(None, Some("noext")), Err(StorageError::UnknownType)));
    assert!(matches!(resolve_extension(Some("text/plain"), Some("doc.pdf")), Err(StorageError::UnsupportedType)));
    assert!(matches!(resolve_extension(Some("image/gif"), Some("anim.gif")), Err(StorageError::UnsupportedType)));
}

// =============================================================================
// validate_upload
// =============================================================================

#[test]
fn empty_upload_is_rejected() {
    let image = ImageUpload { content_type: Some("image/png".into()), ..ImageUpload::default() };
    assert!(matches!(validate_upload(&image), Err(StorageError::Empty)));
}

#[test]
fn oversized_upload_is_rejected() {
    let image = ImageUpload {
        file_name: Some("big.png".into()),
        content_type: Some("image/png".into()),
        bytes: vec![0; MAX_IMAGE_BYTES + 1],
    };
    assert!(matches!(validate_upload(&image), Err(StorageError::TooLarge)));
}

#[test]
fn upload_at_limit_is_accepted() {
    let image = ImageUpload { file_name: Some("ok.jpg".into()), content_type: None, bytes: vec![1; MAX_IMAGE_BYTES] };
    assert_eq!(validate_upload(&image).unwrap(), ".jpg");
}

#[test]
fn client_error_classification() {
    assert!(StorageError::Empty.is_client_error());
    assert!(StorageError::UnsupportedType.is_client_error());
    assert!(!StorageError::TooLarge.is_client_error());
    assert!(!StorageError::NoRemoteDir.is_client_error());
}

// =============================================================================
// naming and paths
// =============================================================================

#[test]
fn object_name_uses_unix_millis() {
    let at = datetime!(2024-01-01 00:00:00.123 UTC);
    assert_eq!(object_name("member", 7, at, ".png"), "member-7-1704067200123.png");
}

#[test]
fn remote_dir_normalisation() {
    assert_eq!(normalize_remote_dir("/srv/media/avatars").unwrap(), "/srv/media/avatars/");
    assert_eq!(normalize_remote_dir("/srv/media/avatars/").unwrap(), "/srv/media/avatars/");
    assert_eq!(normalize_remote_dir("C:\\media\\dogs").unwrap(), "C:/media/dogs/");
    assert!(matches!(normalize_remote_dir("  "), Err(StorageError::NoRemoteDir)));
}

#[test]
fn dir_prefixes_absolute_and_relative() {
    assert_eq!(dir_prefixes("/srv/a/b/"), vec!["/srv", "/srv/a", "/srv/a/b"]);
    assert_eq!(dir_prefixes("up/x/"), vec!["up", "up/x"]);
    assert!(dir_prefixes("/").is_empty());
}

#[test]
fn file_name_from_url_accepts_direct_children() {
    let base = "https://media.example.com/avatars";
    assert_eq!(
        file_name_from_url(base, "https://media.example.com/avatars/member-1-5.jpg").as_deref(),
        Some("member-1-5.jpg")
    );
    assert_eq!(
        file_name_from_url(base, "HTTPS://MEDIA.example.com/avatars/member-1-5.jpg").as_deref(),
        Some("member-1-5.jpg")
    );
}

#[test]
fn file_name_from_url_rejects_foreign_or_nested() {
    let base = "https://media.example.com/avatars";
    assert_eq!(file_name_from_url(base, "https://elsewhere.com/avatars/a.jpg"), None);
    assert_eq!(file_name_from_url(base, "https://media.example.com/avatars/sub/a.jpg"), None);
    assert_eq!(file_name_from_url(base, "https://media.example.com/avatars/"), None);
    assert_eq!(file_name_from_url(base, "https://media.example.com/avatars/.."), None);
    assert_eq!(file_name_from_url(base, ""), None);
    assert_eq!(file_name_from_url("", "https://media.example.com/avatars/a.jpg"), None);
}

#[test]
fn file_name_from_url_requires_a_path_boundary() {
    let base = "https://cdn.example/avatars";
    assert_eq!(file_name_from_url(base, "https://cdn.example/avatarsmember-7-1.jpg"), None);
    assert_eq!(file_name_from_url(base, "https://cdn.example/avatars-old/member-7-1.jpg"), None);
    assert_eq!(
        file_name_from_url(base, "https://cdn.example/avatars/member-7-1.jpg").as_deref(),
        Some("member-7-1.jpg")
    );
}

#[test]
fn owned_file_name_only_matches_the_owner() {
    let base = "https://cdn.example/avatars";
    assert_eq!(
        owned_file_name(base, "member", 7, "https://cdn.example/avatars/member-7-1700000000000.jpg").as_deref(),
        Some("member-7-1700000000000.jpg")
    );
    assert_eq!(owned_file_name(base, "member", 7, "https://cdn.example/avatars/member-9-1700000000000.jpg"), None);
    assert_eq!(owned_file_name(base, "member", 7, "https://cdn.example/avatars/member-77-1700000000000.jpg"), None);
    assert_eq!(owned_file_name(base, "member", 7, "https://cdn.example/avatars/dog-7-1700000000000.jpg"), None);
    assert_eq!(owned_file_name(base, "member", 7, "https://cdn.example/avatars/notes.txt"), None);
}

// =============================================================================
// SftpStore construction
// =============================================================================

fn sftp_settings(avatar_dir: &str) -> SftpSettings {
    SftpSettings {
        host: "media.example.com".into(),
        port: 22,
        user: "doghub".into(),
        password: "secret".into(),
        avatars: BucketSettings { remote_dir: avatar_dir.into(), public_base_url: "https://m/avatars/".into() },
        dog_photos: BucketSettings { remote_dir: "/srv/dogs".into(), public_base_url: "https://m/dogs".into() },
    }
}

#[test]
fn store_normalises_settings() {
    let store = SftpStore::avatars(&sftp_settings("/srv/avatars")).unwrap();
    assert_eq!(store.remote_dir, "/srv/avatars/");
    assert_eq!(store.public_base_url, "https://m/avatars");
    assert_eq!(store.prefix, "member");
    assert_eq!(SftpStore::dog_photos(&sftp_settings("/x")).unwrap().prefix, "dog");
}

#[test]
fn store_requires_remote_dir() {
    assert!(matches!(SftpStore::avatars(&sftp_settings("")), Err(StorageError::NoRemoteDir)));
}

#[tokio::test]
async fn invalid_upload_fails_without_connecting() {
    let store = SftpStore::avatars(&sftp_settings("/srv/avatars")).unwrap();
    let err = store.upload(1, ImageUpload::default()).await.unwrap_err();
    assert!(matches!(err, StorageError::Empty));
}

#[tokio::test]
async fn delete_of_foreign_url_is_a_no_op() {
    let store = SftpStore::avatars(&sftp_settings("/srv/avatars")).unwrap();
    store.delete_by_url(1, "https://elsewhere.com/a.jpg").await;
}
