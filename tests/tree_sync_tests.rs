use davplay::credentials::Credentials;
use davplay::services::webdav::{WebDAVConfig, WebDAVConnection, WebDAVWalker};
use davplay::test_utils::RecordingNotifier;
use davplay::tree::{FileTree, TreeSynchronizer};
use davplay::PlayerError;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const ROOT_LISTING: &str = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:">
  <d:response><d:href>/remote.php/dav/files/alice/</d:href><d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop></d:propstat></d:response>
  <d:response><d:href>/remote.php/dav/files/alice/Videos/</d:href><d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop></d:propstat></d:response>
  <d:response><d:href>/remote.php/dav/files/alice/Private/</d:href><d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop></d:propstat></d:response>
  <d:response><d:href>/remote.php/dav/files/alice/trailer.mp4</d:href><d:propstat><d:prop><d:resourcetype/><d:getcontenttype>video/mp4</d:getcontenttype></d:prop></d:propstat></d:response>
</d:multistatus>"#;

const VIDEOS_LISTING: &str = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:">
  <d:response><d:href>/remote.php/dav/files/alice/Videos/</d:href><d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop></d:propstat></d:response>
  <d:response><d:href>/remote.php/dav/files/alice/Videos/Movie.mp4</d:href><d:propstat><d:prop><d:resourcetype/></d:prop></d:propstat></d:response>
  <d:response><d:href>/remote.php/dav/files/alice/Videos/Clips/</d:href><d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop></d:propstat></d:response>
</d:multistatus>"#;

async fn setup() -> (MockServer, TreeSynchronizer<WebDAVWalker>) {
    let server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/remote.php/dav/files/alice/"))
        .respond_with(ResponseTemplate::new(207).set_body_string(ROOT_LISTING))
        .mount(&server)
        .await;
    Mock::given(method("PROPFIND"))
        .and(path("/remote.php/dav/files/alice/Videos/"))
        .respond_with(ResponseTemplate::new(207).set_body_string(VIDEOS_LISTING))
        .mount(&server)
        .await;
    Mock::given(method("PROPFIND"))
        .and(path("/remote.php/dav/files/alice/Private/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let config = WebDAVConfig::new(Credentials::new(&server.uri(), "alice", "secret"));
    let connection = WebDAVConnection::new(config).expect("Failed to create test connection");
    (server, TreeSynchronizer::new(WebDAVWalker::new(connection)))
}

fn child_summary(tree: &FileTree, id: davplay::tree::NodeId) -> Vec<(String, bool)> {
    tree.child_entries(id)
        .into_iter()
        .map(|e| (e.display_name.clone(), e.is_directory))
        .collect()
}

#[tokio::test]
async fn test_root_expansion_lists_children() {
    let (_server, sync) = setup().await;
    let notifier = RecordingNotifier::new();
    let mut tree = FileTree::new();

    let count = sync.expand_root(&mut tree, &notifier).await.unwrap();

    assert_eq!(count, 3);
    assert_eq!(
        child_summary(&tree, tree.root()),
        vec![
            ("Videos/".to_string(), true),
            ("Private/".to_string(), true),
            ("trailer.mp4".to_string(), false),
        ]
    );
    assert_eq!(notifier.count(), 0);
}

#[tokio::test]
async fn test_expanding_twice_gives_same_children() {
    let (_server, sync) = setup().await;
    let notifier = RecordingNotifier::new();
    let mut tree = FileTree::new();

    sync.expand_root(&mut tree, &notifier).await.unwrap();
    let videos = tree.find_by_path("Videos/").unwrap();

    sync.expand(&mut tree, videos, &notifier).await.unwrap();
    let first = child_summary(&tree, videos);
    sync.expand(&mut tree, videos, &notifier).await.unwrap();
    let second = child_summary(&tree, videos);

    assert_eq!(first, vec![("Movie.mp4".to_string(), false), ("Clips/".to_string(), true)]);
    assert_eq!(first, second);
    assert_eq!(tree.children(videos).len(), 2);
}

#[tokio::test]
async fn test_unauthorized_expansion_leaves_children_untouched() {
    let (_server, sync) = setup().await;
    let notifier = RecordingNotifier::new();
    let mut tree = FileTree::new();

    sync.expand_root(&mut tree, &notifier).await.unwrap();
    let private = tree.find_by_path("Private/").unwrap();
    let rows_before = tree.visible_rows();

    let err = sync.expand(&mut tree, private, &notifier).await.unwrap_err();

    assert!(matches!(err, PlayerError::AuthRejected { status: 401, .. }));
    assert!(tree.children(private).is_empty());
    assert!(!tree.node(private).unwrap().is_loaded());
    assert_eq!(tree.visible_rows(), rows_before);
    assert_eq!(notifier.count(), 1);
}

#[tokio::test]
async fn test_vanished_directory_keeps_previous_children() {
    let (server, sync) = setup().await;
    let notifier = RecordingNotifier::new();
    let mut tree = FileTree::new();

    sync.expand_root(&mut tree, &notifier).await.unwrap();
    let videos = tree.find_by_path("Videos/").unwrap();
    sync.expand(&mut tree, videos, &notifier).await.unwrap();
    let before = child_summary(&tree, videos);

    // The directory disappears on the server between two expansions
    server.reset().await;
    Mock::given(method("PROPFIND"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = sync.expand(&mut tree, videos, &notifier).await.unwrap_err();

    assert!(matches!(err, PlayerError::AuthRejected { status: 404, .. }));
    assert_eq!(child_summary(&tree, videos), before);
    assert_eq!(notifier.count(), 1);
    assert_eq!(notifier.notices()[0].title, "Login failed");
}
