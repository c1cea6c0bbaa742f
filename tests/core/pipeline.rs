use chrono::NaiveDate;
use kepfix::core::document;
use kepfix::core::error::KepfixError;
use kepfix::core::fix::{self, FixOptions, FixOutcome, FixStatus};
use kepfix::core::history::History;
use kepfix::core::locator::MetadataLines;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

struct FakeHistory {
    first: Option<NaiveDate>,
    last: Option<NaiveDate>,
    queried: RefCell<Vec<PathBuf>>,
}

impl FakeHistory {
    fn reachable() -> Self {
        Self {
            first: NaiveDate::from_ymd_opt(2018, 4, 15),
            last: NaiveDate::from_ymd_opt(2019, 2, 1),
            queried: RefCell::new(Vec::new()),
        }
    }

    fn unreachable() -> Self {
        Self {
            first: None,
            last: None,
            queried: RefCell::new(Vec::new()),
        }
    }

    fn answer(&self, path: &Path, date: Option<NaiveDate>) -> Result<NaiveDate, KepfixError> {
        self.queried.borrow_mut().push(path.to_path_buf());
        date.ok_or_else(|| KepfixError::VcsQueryError {
            path: path.to_path_buf(),
            message: "git log exited with exit status: 128".into(),
        })
    }
}

impl History for FakeHistory {
    fn first_added(&self, path: &Path) -> Result<NaiveDate, KepfixError> {
        self.answer(path, self.first)
    }

    fn last_touched(&self, path: &Path) -> Result<NaiveDate, KepfixError> {
        self.answer(path, self.last)
    }
}

fn fix_str(text: &str, history: &dyn History) -> Result<String, KepfixError> {
    match fix::fix_text(Path::new("keps/0001.md"), text, history, &FixOptions::default())? {
        FixOutcome::Rendered { text, .. } => Ok(text),
        FixOutcome::Skipped => panic!("document was skipped"),
    }
}

fn metadata_of(text: &str) -> Vec<String> {
    document::split(Path::new("x.md"), text)
        .expect("front matter")
        .metadata
        .into_inner()
}

#[test]
fn minimal_header_becomes_full_canonical_block() {
    let history = FakeHistory::reachable();
    let out = fix_str(
        "---\nauthors: \"@x\"\nstatus: draft\n---\n# Title\n\nBody text.\n",
        &history,
    )
    .expect("fix");
    assert_eq!(
        out,
        "---\n\
         title: TBD\n\
         authors:\n  - \"@x\"\n\
         reviewers:\n  - TBD\n\
         approvers:\n  - TBD\n\
         creation-date: 2018-04-15\n\
         last-updated: 2019-02-01\n\
         status: draft\n\
         ---\n# Title\n\nBody text.\n"
    );
    assert_eq!(history.queried.borrow().len(), 2);
}

#[test]
fn missing_title_is_filled_with_placeholder() {
    let out = fix_str(
        "---\nauthors:\n  - \"@a\"\nstatus: implementable\n---\n",
        &FakeHistory::reachable(),
    )
    .expect("fix");
    assert!(metadata_of(&out).contains(&"title: TBD".to_string()));
}

#[test]
fn single_author_becomes_a_list() {
    let out = fix_str("---\nauthors: \"@single\"\n---\n", &FakeHistory::reachable()).expect("fix");
    assert!(out.contains("authors:\n  - \"@single\"\n"));
}

#[test]
fn bracketed_title_is_quoted() {
    let out = fix_str("---\ntitle: [abc]\nstatus: draft\n---\n", &FakeHistory::reachable())
        .expect("fix");
    assert!(metadata_of(&out).contains(&"title: \"[abc]\"".to_string()));
}

#[test]
fn missing_creation_date_comes_from_history() {
    let out = fix_str(
        "---\ntitle: T\nlast-updated: 2020-01-01\n---\n",
        &FakeHistory::reachable(),
    )
    .expect("fix");
    let metadata = metadata_of(&out);
    assert!(metadata.contains(&"creation-date: 2018-04-15".to_string()));
    assert!(metadata.contains(&"last-updated: 2020-01-01".to_string()));
}

#[test]
fn history_failure_writes_nothing() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("kep.md");
    let original = "---\ntitle: T\nstatus: draft\n---\nbody\n";
    fs::write(&path, original).expect("write");

    let err = fix::fix_file(&path, &FakeHistory::unreachable(), &FixOptions::default())
        .expect_err("history is unreachable");
    assert!(matches!(err, KepfixError::VcsQueryError { .. }));
    assert_eq!(fs::read_to_string(&path).expect("read"), original);
}

#[test]
fn messy_header_is_repaired_and_canonicalized() {
    let input = "<!-- generated -->\n\
        ---\n\
        Title: Node Swap   \n\
        authors:\n  - @alice\n  - github: @bob\n\
        owning-sig: sig-node\n\
        see-also:\n  - [KEP-1](https://example.com/kep-1)\n  - /keps/sig-node/0002\n\
        reviewers: [\"@carol\"]\n\
        approvers:\n\
        creation-date: \"around 2018-03-04\"\n\
        status: provisional\n\
        extra-key: dropped\n\
        ```\n\
        ## Summary\n\ntext\n";
    let history = FakeHistory::reachable();
    let out = fix_str(input, &history).expect("fix");
    assert_eq!(
        out,
        "<!-- generated -->\n\
         ---\n\
         title: Node Swap\n\
         authors:\n  - \"@alice\"\n  - \"@bob\"\n\
         owning-sig: sig-node\n\
         reviewers:\n  - \"@carol\"\n\
         approvers:\n  - TBD\n\
         creation-date: 2018-03-04\n\
         last-updated: 2019-02-01\n\
         status: provisional\n\
         see-also:\n  - \"[KEP-1](https://example.com/kep-1)\"\n  - \"/keps/sig-node/0002\"\n\
         ---\n\
         ```\n\
         ## Summary\n\ntext\n"
    );
    assert_eq!(history.queried.borrow().len(), 1);
}

#[test]
fn canonical_output_is_a_fixed_point() {
    let history = FakeHistory::reachable();
    let inputs = [
        "---\nauthors: \"@x\"\nstatus: draft\n---\nbody\n",
        "---\ntitle: \"A: subtitle\"\nauthors:\n  - @a\nsee-also:\n  - [x](y)\neditor:\nreplaces: []\n---\n",
        "intro\n---\ntitle: x -y\nstatus: s\ncreation-date: 2017-01-02\n```\nbody\n",
        "---\ntitle: 'true'\nstatus: '123'\n---\n",
        "---\ntitle: '*star'\nowning-sig: 'null'\n---\n",
        "---\ntitle: 'a #b'\nauthors:\n  - '{braced}'\n  - \"#hash\"\n---\n",
        "---\ntitle: |\n  line one\n  line two\nstatus: draft\n---\n",
    ];
    for input in inputs {
        let once = fix_str(input, &history).expect("first pass");
        let twice = fix_str(&once, &history).expect("second pass");
        assert_eq!(once, twice, "not idempotent for {:?}", input);

        let status = match fix::fix_text(Path::new("k.md"), &once, &history, &FixOptions::default())
            .expect("third pass")
        {
            FixOutcome::Rendered { report, .. } => report.status,
            FixOutcome::Skipped => FixStatus::Skipped,
        };
        assert_eq!(status, FixStatus::Unchanged);
    }
}

#[test]
fn retyped_and_multi_line_values_survive_a_second_run() {
    let history = FakeHistory::reachable();
    let out = fix_str(
        "---\ntitle: 'true'\nstatus: '123'\neditor: 'a #b'\n---\n",
        &history,
    )
    .expect("fix");
    let metadata = metadata_of(&out);
    assert!(metadata.contains(&"title: \"true\"".to_string()));
    assert!(metadata.contains(&"status: \"123\"".to_string()));
    assert!(metadata.contains(&"editor: \"a #b\"".to_string()));

    let out = fix_str("---\ntitle: |\n  line one\n  line two\n---\n", &history).expect("fix");
    assert!(metadata_of(&out).contains(&"title: \"line one\\nline two\\n\"".to_string()));
    let again = fix_str(&out, &history).expect("second pass");
    assert_eq!(out, again);
}

#[test]
fn split_and_render_round_trips() {
    let inputs = [
        "---\ntitle: x\n---\nbody with --- inside\n---\n",
        "preface\n\n---\nauthors:\n- \"@a\"   \n---\n\n# H\n",
        "---\r\ntitle: x\r\n---\r\nbody",
    ];
    for input in inputs {
        let doc = document::split(Path::new("r.md"), input).expect("split");
        assert_eq!(doc.render(), input);
    }
}

#[test]
fn field_ranges_partition_the_block() {
    let lines = MetadataLines::from_text(
        "title: T\nauthors:\n  - \"@a\"\n  - \"@b\"\nowning-sig: sig-x\nsee-also:\n  - \"https://x.io/a: b\"\nstatus: s\n",
    );
    let keys = ["title", "authors", "owning-sig", "see-also", "status"];
    let mut next = 0;
    for key in keys {
        let (start, end) = lines.field(key).expect("key present");
        assert_eq!(start, next, "{} starts where the previous key ended", key);
        next = end + 1;
    }
    assert_eq!(next, lines.len());
}

#[test]
fn batch_reports_every_file() {
    let tmp = tempdir().expect("tempdir");
    let paths: Vec<PathBuf> = ["a.md", "b.md", "c.md"]
        .iter()
        .map(|n| tmp.path().join(n))
        .collect();
    fs::write(&paths[0], "---\ntitle: T\n---\n").expect("write");
    fs::write(&paths[1], "no front matter\n").expect("write");
    fs::write(&paths[2], "---\ntitle: T\n---\n").expect("write");

    let batch = fix::run_batch(&paths, &FakeHistory::unreachable(), &FixOptions::default());
    assert_eq!(batch.files.len(), 3);
    assert_eq!(batch.failed, 2);
    assert_eq!(batch.skipped, 1);
    assert_eq!(batch.files[1].status, FixStatus::Skipped);
    assert!(batch.any_failed());
}
