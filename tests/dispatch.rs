use std::cell::RefCell;
use std::collections::BTreeMap;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use serde_json::{Value, json};

use cmr_harvester::dispatch::{
    JobDispatcher, JobSpec, JobSubmission, default_tag_template, dispatch_all,
};
use cmr_harvester::domain::ShortName;
use cmr_harvester::error::HarvestError;

struct MockMozart {
    locations: BTreeMap<String, Value>,
    fail_on: Option<String>,
    submitted: RefCell<Vec<JobSubmission>>,
}

impl MockMozart {
    fn with_locations(names: &[&str]) -> Self {
        let locations = names
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    json!({
                        "type": "Polygon",
                        "coordinates": [[[-155.6, 19.2], [-155.0, 19.2], [-155.0, 19.7], [-155.6, 19.2]]]
                    }),
                )
            })
            .collect();
        Self {
            locations,
            fail_on: None,
            submitted: RefCell::new(Vec::new()),
        }
    }
}

impl JobDispatcher for MockMozart {
    fn resolve_locations(&self) -> Result<BTreeMap<String, Value>, HarvestError> {
        Ok(self.locations.clone())
    }

    fn submit(&self, job: &JobSubmission) -> Result<String, HarvestError> {
        if job.tags.iter().any(|tag| Some(tag.as_str()) == self.fail_on.as_deref()) {
            return Err(HarvestError::SubmissionStatus {
                status: 400,
                message: "bad job".to_string(),
            });
        }
        let mut submitted = self.submitted.borrow_mut();
        submitted.push(job.clone());
        Ok(format!("job-{}", submitted.len()))
    }
}

fn short_name() -> ShortName {
    "AST_09T".parse().unwrap()
}

fn spec() -> JobSpec {
    JobSpec::new(default_tag_template(
        NaiveDate::from_ymd_opt(2018, 6, 15).unwrap(),
    ))
}

#[test]
fn one_job_per_location() {
    let mozart = MockMozart::with_locations(&["kilauea", "etna"]);
    let submitted = dispatch_all(&mozart, &spec(), &short_name()).unwrap();

    assert_eq!(submitted.len(), 2);
    // locations are visited in name order
    assert_eq!(submitted[0].location_name, "etna");
    assert_eq!(submitted[0].job_id, "job-1");
    assert_eq!(
        submitted[1].tags,
        vec!["20180615automated-cmr-metadata-scrape-kilauea-AST_09T".to_string()]
    );

    let jobs = mozart.submitted.borrow();
    assert_eq!(jobs[0].job_type, "job-scrape_aoi:dev");
    assert_eq!(jobs[0].queue, "factotum-job_worker-small");
    assert_eq!(jobs[0].priority, 2);
    assert_eq!(jobs[0].params["short_name"], json!("AST_09T"));
    assert_eq!(jobs[0].params["location"]["type"], json!("Polygon"));
    assert_eq!(jobs[0].params["cmr_enviorment"], json!("PROD"));
}

#[test]
fn comma_separated_template_gives_several_tags() {
    let mozart = MockMozart::with_locations(&["etna"]);
    let mut spec = spec();
    spec.tag_template = "nightly,backfill".to_string();

    let submitted = dispatch_all(&mozart, &spec, &short_name()).unwrap();
    assert_eq!(
        submitted[0].tags,
        vec!["nightly".to_string(), "backfill-etna-AST_09T".to_string()]
    );
    assert_eq!(
        mozart.submitted.borrow()[0].query_pairs()[2],
        ("tags", r#"["nightly","backfill-etna-AST_09T"]"#.to_string())
    );
}

#[test]
fn no_locations_is_an_error() {
    let mozart = MockMozart::with_locations(&[]);
    let err = dispatch_all(&mozart, &spec(), &short_name()).unwrap_err();
    assert_matches!(err, HarvestError::AoiResolution(_));
    assert!(mozart.submitted.borrow().is_empty());
}

#[test]
fn submission_failure_stops_the_fan_out() {
    let mut mozart = MockMozart::with_locations(&["etna", "kilauea", "stromboli"]);
    mozart.fail_on = Some("20180615automated-cmr-metadata-scrape-kilauea-AST_09T".to_string());

    let err = dispatch_all(&mozart, &spec(), &short_name()).unwrap_err();
    assert_matches!(err, HarvestError::SubmissionStatus { status: 400, .. });
    assert_eq!(mozart.submitted.borrow().len(), 1);
}
