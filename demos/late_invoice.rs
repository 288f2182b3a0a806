use cfdi_portal::core::*;
use chrono::NaiveDate;

fn main() {
    let classifier = LatenessClassifier::default();
    let clock = classifier.deadlines().clock();
    let now = clock.localize(
        NaiveDate::from_ymd_opt(2024, 8, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap(),
    );
    println!("=== Late Invoice Classification (now: {now}) ===\n");

    let cases = [
        ("Wednesday, no claim", NaiveDate::from_ymd_opt(2024, 7, 31), None),
        ("Wednesday, claims week 30", NaiveDate::from_ymd_opt(2024, 7, 31), Some(30)),
        ("Monday of week 31", NaiveDate::from_ymd_opt(2024, 7, 29), None),
        ("Wednesday of week 30", NaiveDate::from_ymd_opt(2024, 7, 24), Some(30)),
    ];

    for (label, date, claim) in cases {
        let Some(date) = date else { continue };
        let verdict = classifier.classify(date, claim, now);
        println!(
            "  {label}: week {}, deadline {}",
            verdict.week,
            verdict.deadline.format("%Y-%m-%d %H:%M")
        );
        if verdict.is_late() {
            for e in verdict.explain() {
                println!("    LATE {e}");
            }
        } else {
            println!("    on time");
        }
    }
}
