use serde_json::json;
use shared::domain::{JobId, PaymentId};

use super::*;

fn job_json(id: u64) -> Value {
    json!({
        "job_id": id.to_string(),
        "client": "0xa11ce",
        "freelancer": "0x0",
        "description": format!("job {id}"),
        "payment_amount": "100000000",
        "job_deadline": "1900000000",
        "is_accepted": false,
        "is_completed": false,
        "is_paid": false,
        "is_freelancer_assigned": false
    })
}

#[test]
fn empty_results_decode_to_empty_collection_and_none() {
    assert!(jobs(Vec::new()).expect("jobs").is_empty());
    assert!(jobs(vec![Value::Null]).expect("jobs").is_empty());
    assert!(payments(vec![json!([])]).expect("payments").is_empty());
    assert!(job(Vec::new()).expect("job").is_none());
    assert!(job(vec![json!({ "vec": [] })]).expect("job").is_none());
    assert!(payment(vec![Value::Null]).expect("payment").is_none());
}

#[test]
fn decodes_job_collections_in_order() {
    let decoded = jobs(vec![json!([job_json(1000), job_json(1001)])]).expect("jobs");
    let ids: Vec<_> = decoded.iter().map(|job| job.job_id).collect();
    assert_eq!(ids, vec![JobId(1000), JobId(1001)]);
}

#[test]
fn decodes_single_job_bare_or_wrapped() {
    let bare = job(vec![job_json(7)]).expect("job").expect("present");
    assert_eq!(bare.job_id, JobId(7));
    let wrapped = job(vec![json!({ "vec": [job_json(9)] })])
        .expect("job")
        .expect("present");
    assert_eq!(wrapped.job_id, JobId(9));
}

#[test]
fn decodes_payments() {
    let decoded = payment(vec![json!({
        "payment_id": 5,
        "payer": "0xa11ce",
        "payee": "0xb0b",
        "amount": "250000000",
        "message": "thanks",
        "is_refunded": true
    })])
    .expect("payment")
    .expect("present");
    assert_eq!(decoded.payment_id, PaymentId(5));
    assert!(decoded.is_refunded);
    assert_eq!(decoded.message, "thanks");
}

#[test]
fn wrong_shapes_are_decode_errors() {
    assert!(matches!(
        jobs(vec![json!({ "not": "a list" })]),
        Err(DecodeError::Shape { expected: "array", found: "object" })
    ));
    assert!(matches!(
        job(vec![json!("0x1")]),
        Err(DecodeError::Shape { expected: "object", found: "string" })
    ));
    assert!(matches!(
        jobs(vec![json!([{ "job_id": "1" }])]),
        Err(DecodeError::Malformed { entity: "job", .. })
    ));
}

#[test]
fn invariant_violations_are_decode_errors() {
    let mut broken = job_json(11);
    broken["is_paid"] = json!(true);
    assert!(matches!(
        jobs(vec![json!([broken])]),
        Err(DecodeError::Inconsistent { entity: "job", .. })
    ));
}
