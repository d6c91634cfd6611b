use davplay::credentials::Credentials;
use davplay::services::webdav::{DirectoryLister, WebDAVConfig, WebDAVConnection, WebDAVWalker};
use davplay::PlayerError;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn walker(server: &MockServer) -> WebDAVWalker {
    let config = WebDAVConfig::new(Credentials::new(&server.uri(), "alice", "secret"));
    WebDAVWalker::new(WebDAVConnection::new(config).expect("Failed to create test connection"))
}

fn collection(href: &str) -> String {
    format!(
        r#"<d:response><d:href>{}</d:href><d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop><d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response>"#,
        href
    )
}

fn file(href: &str, length: u64, content_type: &str) -> String {
    format!(
        r#"<d:response><d:href>{}</d:href><d:propstat><d:prop><d:resourcetype/><d:getcontentlength>{}</d:getcontentlength><d:getcontenttype>{}</d:getcontenttype><d:getlastmodified>Tue, 05 Mar 2024 10:00:00 GMT</d:getlastmodified></d:prop><d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response>"#,
        href, length, content_type
    )
}

fn multistatus(responses: &[String]) -> String {
    format!(
        r#"<?xml version="1.0"?><d:multistatus xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">{}</d:multistatus>"#,
        responses.concat()
    )
}

async fn mount_listing(server: &MockServer, url_path: &str, body: String) {
    Mock::given(method("PROPFIND"))
        .and(path(url_path))
        .and(header("Depth", "1"))
        .respond_with(ResponseTemplate::new(207).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_videos_directory_listing() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        "/remote.php/dav/files/alice/Videos/",
        multistatus(&[
            collection("/remote.php/dav/files/alice/Videos/"),
            file("/remote.php/dav/files/alice/Videos/Movie.mp4", 1_048_576, "video/mp4"),
            collection("/remote.php/dav/files/alice/Videos/Clips/"),
        ]),
    )
    .await;

    let entries = walker(&server).list("Videos/").await.unwrap();

    let names: Vec<_> = entries
        .iter()
        .map(|e| (e.display_name.as_str(), e.is_directory))
        .collect();
    assert_eq!(names, vec![("Movie.mp4", false), ("Clips/", true)]);

    assert_eq!(entries[0].relative_path, "Videos/Movie.mp4");
    assert_eq!(entries[0].content_length, Some(1_048_576));
    assert_eq!(entries[0].content_type.as_deref(), Some("video/mp4"));
    assert!(entries[0].is_video());
    assert_eq!(entries[1].relative_path, "Videos/Clips/");
}

#[tokio::test]
async fn test_self_reference_is_dropped() {
    let server = MockServer::start().await;
    let responses = vec![
        collection("/remote.php/dav/files/alice/"),
        collection("/remote.php/dav/files/alice/Documents/"),
        collection("/remote.php/dav/files/alice/Videos/"),
        file("/remote.php/dav/files/alice/intro.mkv", 10, "video/x-matroska"),
        file("/remote.php/dav/files/alice/notes.txt", 5, "text/plain"),
    ];
    let total = responses.len();
    mount_listing(&server, "/remote.php/dav/files/alice/", multistatus(&responses)).await;

    let entries = walker(&server).list("").await.unwrap();

    assert_eq!(entries.len(), total - 1);
    for entry in &entries {
        assert!(!entry.display_name.is_empty());
        assert_eq!(entry.display_name.ends_with('/'), entry.is_directory);
    }
}

#[tokio::test]
async fn test_encoded_hrefs_are_decoded() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        "/remote.php/dav/files/alice/My%20Videos/",
        multistatus(&[
            collection("/remote.php/dav/files/alice/My%20Videos/"),
            file("/remote.php/dav/files/alice/My%20Videos/F%C3%BCr%20Elise.webm", 42, "video/webm"),
        ]),
    )
    .await;

    let entries = walker(&server).list("My Videos/").await.unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].display_name, "Für Elise.webm");
    assert_eq!(entries[0].relative_path, "My Videos/Für Elise.webm");
}

#[tokio::test]
async fn test_duplicate_hrefs_keep_first() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        "/remote.php/dav/files/alice/",
        multistatus(&[
            collection("/remote.php/dav/files/alice/"),
            file("/remote.php/dav/files/alice/a.mp4", 1, "video/mp4"),
            file("/remote.php/dav/files/alice/a.mp4", 2, "video/mp4"),
        ]),
    )
    .await;

    let entries = walker(&server).list("").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].content_length, Some(1));
}

#[tokio::test]
async fn test_unauthorized_is_auth_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = walker(&server).list("").await.unwrap_err();
    match err {
        PlayerError::AuthRejected { status, .. } => assert_eq!(status, 401),
        other => panic!("Expected AuthRejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_directory_is_auth_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = walker(&server).list("Gone/").await.unwrap_err();
    assert!(matches!(err, PlayerError::AuthRejected { status: 404, .. }));
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        "/remote.php/dav/files/alice/",
        "<d:multistatus xmlns:d=\"DAV:\"><d:response><d:href>".to_string(),
    )
    .await;

    let err = walker(&server).list("").await.unwrap_err();
    assert!(matches!(err, PlayerError::MalformedResponse { .. }));
}

#[tokio::test]
async fn test_response_without_href_is_rejected() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        "/remote.php/dav/files/alice/",
        multistatus(&["<d:response><d:propstat><d:prop><d:resourcetype/></d:prop></d:propstat></d:response>".to_string()]),
    )
    .await;

    let err = walker(&server).list("").await.unwrap_err();
    assert!(matches!(err, PlayerError::MalformedResponse { .. }));
}
