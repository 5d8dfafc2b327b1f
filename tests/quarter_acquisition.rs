//! End-to-end quarter acquisition against a mock EDGAR server, covering the
//! scenarios enumerated in the design's testable-properties section: a clean
//! download, a filing with no matching files, entity/ticker filtering, and the
//! files/tar mode-switch refetch law. No test reaches the real SEC servers.

use sec_archive::{Acquisition, FetchConfig, Fetcher, FilingStatus, OutputMode};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MASTER_INDEX_ONE_ROW: &str = "Description:           Master Index of EDGAR Dissemination Feed\n\
     Last Data Received:    March 31, 2024\n\
     Comments:              webmaster@sec.gov\n\
     \n\
     CIK|Company Name|Form Type|Date Filed|Filename\n\
     --------------------------------------------------------------------------------\n\
     1000045|NICHOLAS FINANCIAL INC|10-Q|2024-01-02|edgar/data/1000045/0001000045-24-000001.txt\n";

const MASTER_INDEX_TWO_ROWS: &str = "CIK|Company Name|Form Type|Date Filed|Filename\n\
     --------------------------------------------------------------------------------\n\
     1000045|NICHOLAS FINANCIAL INC|10-Q|2024-01-02|edgar/data/1000045/0001000045-24-000001.txt\n\
     1000046|OTHER CORP|10-Q|2024-01-03|edgar/data/1000046/0001000046-24-000001.txt\n";

fn config(server: &MockServer, data_dir: &std::path::Path, output_mode: OutputMode) -> FetchConfig {
    FetchConfig::new(data_dir)
        .with_user_agent("sec-archive-tests contact@example.com")
        .with_archive_base(format!("{}/Archives/edgar", server.uri()))
        .with_extensions(vec![".xml".to_string()])
        .with_output_mode(output_mode)
        .with_rate_limit(1000.0)
}

async fn mount_folder_listing(server: &MockServer, accession_no_dash: &str, names: &[&str]) {
    let body = serde_json::json!({
        "directory": {
            "item": names.iter().map(|n| serde_json::json!({"name": n})).collect::<Vec<_>>(),
        }
    });
    Mock::given(method("GET"))
        .and(path(format!(
            "/Archives/edgar/data/1000045/{accession_no_dash}/index.json"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn downloads_one_matching_filing_and_cleans_up_index_cache() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/Archives/edgar/full-index/2024/QTR1/master.idx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MASTER_INDEX_ONE_ROW))
        .mount(&server)
        .await;

    mount_folder_listing(&server, "000100004524000001", &["doc.xml", "readme.txt"]).await;

    Mock::given(method("GET"))
        .and(path("/Archives/edgar/data/1000045/000100004524000001/doc.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<xml/>".to_vec()))
        .mount(&server)
        .await;

    let config = config(&server, dir.path(), OutputMode::Files);
    let fetcher = Fetcher::new(config).unwrap();
    let input = Acquisition::Quarter {
        year: 2024,
        quarter: 1,
        forms: vec!["10-Q".to_string()],
    };

    let results = fetcher.acquire(input, &[], &[], None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, FilingStatus::Downloaded);

    let expected = dir
        .path()
        .join("filings/10-Q/0001000045/0001000045-24-000001/doc.xml");
    assert!(expected.exists());
    assert!(!dir.path().join("filings/10-Q/0001000045/0001000045-24-000001/readme.txt").exists());

    let quarter_cache = dir.path().join("index/master/2024/QTR1");
    assert!(!quarter_cache.exists(), "quarter index cache should be removed after a clean run");
}

#[tokio::test]
async fn no_matching_files_produces_error_and_retains_index_cache() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/Archives/edgar/full-index/2024/QTR1/master.idx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MASTER_INDEX_ONE_ROW))
        .mount(&server)
        .await;

    mount_folder_listing(&server, "000100004524000001", &["readme.txt"]).await;

    let config = config(&server, dir.path(), OutputMode::Files);
    let fetcher = Fetcher::new(config).unwrap();
    let input = Acquisition::Quarter {
        year: 2024,
        quarter: 1,
        forms: vec!["10-Q".to_string()],
    };

    let results = fetcher.acquire(input, &[], &[], None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, FilingStatus::Error);

    let quarter_cache = dir.path().join("index/master/2024/QTR1");
    assert!(quarter_cache.exists(), "quarter index cache must be retained after an error");

    let staging_dir = dir.path().join("filings/10-Q/0001000045/0001000045-24-000001.tmp");
    assert!(!staging_dir.exists(), "failed tasks must not leave a staging directory behind");
}

#[tokio::test]
async fn entity_filter_restricts_to_one_cik() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/Archives/edgar/full-index/2024/QTR1/master.idx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MASTER_INDEX_TWO_ROWS))
        .mount(&server)
        .await;

    mount_folder_listing(&server, "000100004524000001", &["doc.xml"]).await;
    Mock::given(method("GET"))
        .and(path("/Archives/edgar/data/1000045/000100004524000001/doc.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<xml/>".to_vec()))
        .mount(&server)
        .await;

    let config = config(&server, dir.path(), OutputMode::Files);
    let fetcher = Fetcher::new(config).unwrap();
    let input = Acquisition::Quarter {
        year: 2024,
        quarter: 1,
        forms: vec!["10-Q".to_string()],
    };

    let results = fetcher.acquire(input, &["1000045".to_string()], &[], None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].cik, "0001000045");
    assert_eq!(results[0].status, FilingStatus::Downloaded);
}

#[tokio::test]
async fn ticker_filter_resolves_through_packaged_map() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let index = "CIK|Company Name|Form Type|Date Filed|Filename\n\
         --------------------------------------------------------------------------------\n\
         1800|ABBOTT LABORATORIES|10-Q|2024-01-02|edgar/data/1800/0000001800-24-000001.txt\n\
         1000046|OTHER CORP|10-Q|2024-01-03|edgar/data/1000046/0001000046-24-000001.txt\n";

    Mock::given(method("GET"))
        .and(path("/Archives/edgar/full-index/2024/QTR1/master.idx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(index))
        .mount(&server)
        .await;

    let body = serde_json::json!({"directory": {"item": [{"name": "doc.xml"}]}});
    Mock::given(method("GET"))
        .and(path("/Archives/edgar/data/1800/000000180024000001/index.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Archives/edgar/data/1800/000000180024000001/doc.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<xml/>".to_vec()))
        .mount(&server)
        .await;

    let config = config(&server, dir.path(), OutputMode::Files);
    let fetcher = Fetcher::new(config).unwrap();
    let input = Acquisition::Quarter {
        year: 2024,
        quarter: 1,
        forms: vec!["10-Q".to_string()],
    };

    let results = fetcher.acquire(input, &[], &["ABT".to_string()], None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].cik, "0000001800");
    assert_eq!(results[0].status, FilingStatus::Downloaded);
}

#[tokio::test]
async fn files_mode_then_tar_mode_both_redownload() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/Archives/edgar/full-index/2024/QTR1/master.idx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MASTER_INDEX_ONE_ROW))
        .mount(&server)
        .await;

    mount_folder_listing(&server, "000100004524000001", &["doc.xml"]).await;
    Mock::given(method("GET"))
        .and(path("/Archives/edgar/data/1000045/000100004524000001/doc.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<xml/>".to_vec()))
        .mount(&server)
        .await;

    let input = || Acquisition::Quarter {
        year: 2024,
        quarter: 1,
        forms: vec!["10-Q".to_string()],
    };

    let files_config = config(&server, dir.path(), OutputMode::Files);
    let files_fetcher = Fetcher::new(files_config).unwrap();
    let files_results = files_fetcher.acquire(input(), &[], &[], None).await.unwrap();
    assert_eq!(files_results[0].status, FilingStatus::Downloaded);
    assert!(dir
        .path()
        .join("filings/10-Q/0001000045/0001000045-24-000001/doc.xml")
        .exists());

    let tar_config = config(&server, dir.path(), OutputMode::Tar);
    let tar_fetcher = Fetcher::new(tar_config).unwrap();
    let tar_results = tar_fetcher.acquire(input(), &[], &[], None).await.unwrap();
    assert_eq!(tar_results[0].status, FilingStatus::Downloaded);

    let tar_path = dir.path().join("filings_tar/10-Q/0001000045/0001000045-24-000001.tar");
    assert!(tar_path.exists());

    let file = std::fs::File::open(&tar_path).unwrap();
    let mut archive = tar::Archive::new(file);
    let names: Vec<String> = archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["metadata.json".to_string(), "doc.xml".to_string()]);
}

#[tokio::test]
async fn second_run_in_same_mode_skips_every_filing() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/Archives/edgar/full-index/2024/QTR1/master.idx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MASTER_INDEX_ONE_ROW))
        .mount(&server)
        .await;

    mount_folder_listing(&server, "000100004524000001", &["doc.xml"]).await;
    Mock::given(method("GET"))
        .and(path("/Archives/edgar/data/1000045/000100004524000001/doc.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<xml/>".to_vec()))
        .mount(&server)
        .await;

    let input = || Acquisition::Quarter {
        year: 2024,
        quarter: 1,
        forms: vec!["10-Q".to_string()],
    };

    let fetcher = Fetcher::new(config(&server, dir.path(), OutputMode::Files)).unwrap();
    let first = fetcher.acquire(input(), &[], &[], None).await.unwrap();
    assert_eq!(first[0].status, FilingStatus::Downloaded);

    // A second run must not hit the folder or per-file endpoints again, only
    // the master index (served from cache removal means it re-fetches once
    // more — but the filing itself is skipped via the manifest).
    let second = fetcher.acquire(input(), &[], &[], None).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].status, FilingStatus::Skipped);
}
