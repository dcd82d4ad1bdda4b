//! End-to-end builds against a temporary site.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use folio::build::Builder;
use folio::build::pipeline::plugins::blogroll::{FetchError, RemoteEntry, RemoteFeed};
use folio::build::pipeline::plugins::{BlogrollPlugin, FeedFetcher};
use folio::build::pipeline::{BuildError, Orchestrator, Stage};
use folio::config::Config;

const CONFIG: &str = r#"
site:
  name: Field Notes
  url: https://notes.example.com
build:
  workers: 3
  private: 'category == "Journal"'
feeds:
  - name: posts
    title: Posts
    filter: '"go" in tags'
    reverse: true
    formats: [html, rss, json]
  - name: news
    filter: category == "News"
blogroll:
  cache_dir: cache
  feeds:
    - name: friend
      url: https://friend.example/feed.xml
    - name: down
      url: https://down.example/feed.xml
"#;

struct CannedFetcher {
    feeds: HashMap<String, RemoteFeed>,
}

#[async_trait]
impl FeedFetcher for CannedFetcher {
    async fn fetch(&self, url: &str) -> Result<RemoteFeed, FetchError> {
        match self.feeds.get(url) {
            Some(feed) => Ok(feed.clone()),
            None => Err(FetchError::Parse(
                feed_rs::parser::parse("<html>not a feed</html>".as_bytes()).unwrap_err(),
            )),
        }
    }
}

fn fetcher() -> Arc<CannedFetcher> {
    let friend = RemoteFeed {
        title: Some("A Friend's Blog".to_string()),
        entries: vec![RemoteEntry {
            title: "Hello from afar".to_string(),
            url: "https://friend.example/hello".to_string(),
            date: None,
            summary: None,
        }],
    };
    Arc::new(CannedFetcher {
        feeds: HashMap::from([("https://friend.example/feed.xml".to_string(), friend)]),
    })
}

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn site(root: &Path) {
    write(root, "folio.yaml", CONFIG);
    write(root, "content/index.md", "---\ntitle: Home\n---\nWelcome.\n");
    write(
        root,
        "content/posts/a.md",
        "---\ntitle: First\ndate: 2024-01-10\ntags: [go]\ncategory: News\n---\nSee [the second](../b/).\n",
    );
    write(
        root,
        "content/posts/b.md",
        "---\ntitle: Second\ndate: 2024-02-01\ntags: [go, rust]\n---\n# Heading\n\nBody.\n",
    );
    write(
        root,
        "content/posts/draft.md",
        "---\ntitle: Unfinished\ndraft: true\ntags: [go]\n---\nTODO\n",
    );
    write(
        root,
        "content/posts/journal.md",
        "---\ntitle: Diary\ndate: 2024-01-15\ntags: [go]\ncategory: Journal\n---\nPrivate.\n",
    );
    write(root, "content/style.css", "body { color: black; }");
}

fn orchestrator(config: &Config) -> Orchestrator {
    let mut without_blogroll = config.clone();
    without_blogroll.blogroll.feeds.clear();
    let mut orchestrator = Orchestrator::with_defaults(&without_blogroll);
    orchestrator.register(BlogrollPlugin::new(config.blogroll.clone()).with_fetcher(fetcher()));
    orchestrator
}

#[test]
fn test_full_build() {
    let dir = tempfile::tempdir().unwrap();
    site(dir.path());
    let config = Config::from_yaml_str(CONFIG).unwrap();

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let builder = Builder::new(config.clone(), dir.path().to_path_buf());
    let result = builder
        .build_with(&mut orchestrator(&config), runtime.handle().clone())
        .unwrap();

    assert_eq!(result.documents, 5);
    assert_eq!(result.static_files, 1);
    assert_eq!(result.failed_sources, 1);

    let store = &result.store;
    let feed = |name: &str| store.feeds.iter().find(|f| f.name == name).unwrap();

    // Drafts and private items stay out of feeds; newest first
    assert_eq!(feed("posts").slugs, vec!["posts/b", "posts/a"]);
    assert_eq!(feed("news").slugs, vec!["posts/a"]);
    assert_eq!(feed("tags/go").slugs, vec!["posts/b", "posts/a"]);
    assert_eq!(feed("archive/2024/01").slugs, vec!["posts/a"]);
    assert!(feed("down").error.is_some());
    assert!(feed("friend").error.is_none());
    assert_eq!(feed("blogroll").slugs, vec!["blogroll/friend/1"]);

    let item = |slug: &str| store.items.iter().find(|i| i.slug == slug).unwrap();
    assert_eq!(item("posts/a").links.outbound, vec!["posts/b"]);
    assert_eq!(item("posts/b").links.inbound, vec!["posts/a"]);
    assert_eq!(item("posts/b").links.next.as_deref(), Some("posts/a"));
    assert!(item("posts/journal").private);
    assert!(item("posts/draft").skip);

    let out = &result.output_dir;
    let read = |relative: &str| std::fs::read_to_string(out.join(relative)).unwrap();
    assert!(read("index.html").contains("Welcome."));
    assert!(read("posts/b/index.html").contains("id=\"heading\""));
    assert!(read("posts/index.html").contains("Second"));
    assert!(read("posts/index.xml").contains("<title>First</title>"));
    assert!(read("posts/feed.json").contains("jsonfeed.org"));
    assert!(read("tags/go/index.html").contains("First"));
    assert!(read("blogroll/index.html").contains("Hello from afar"));
    assert!(read("style.css").contains("color"));
    assert!(read("graph.json").contains("posts/b"));
    assert!(!out.join("posts/draft/index.html").exists());

    // Successful sources are memoized on disk for the next build
    assert!(dir.path().join("cache").read_dir().unwrap().next().is_some());
}

#[test]
fn test_invalid_feed_filter_stops_before_output() {
    let dir = tempfile::tempdir().unwrap();
    site(dir.path());
    let mut config = Config::from_yaml_str(CONFIG).unwrap();
    config.feeds[1].filter = Some("category ==".to_string());

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let builder = Builder::new(config.clone(), dir.path().to_path_buf());
    let err = builder
        .build_with(&mut orchestrator(&config), runtime.handle().clone())
        .unwrap_err();

    match err {
        BuildError::Stage(stage_error) => {
            assert_eq!(stage_error.plugin, "feeds");
            assert_eq!(stage_error.stage, Stage::Collect);
            assert!(stage_error.to_string().contains("'news'"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dir.path().join("_site").exists());
}

#[test]
fn test_priority_overrides_from_config() {
    let yaml = format!("{CONFIG}\nplugins:\n  markdown:\n    priority:\n      transform: -200\n");
    let config = Config::from_yaml_str(&yaml).unwrap();

    let mut orchestrator = orchestrator(&config);
    orchestrator.apply_overrides(&config.plugins);

    assert_eq!(orchestrator.plan(Stage::Transform), vec!["markdown", "links"]);
    assert_eq!(
        orchestrator.plan(Stage::Collect),
        vec!["taxonomy", "feeds", "blogroll"]
    );
}
