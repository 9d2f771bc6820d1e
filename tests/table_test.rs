use calendme::table::{csv_source, normalize_rows, normalize_with_headers, ColumnMapping};
use pretty_assertions::assert_eq;

const TIMETABLE: &str = "\
Course,Title,Date,Time,Location
CS101,Intro to Programming,2025-01-10,09:00,Hall A
,,2025-01-10,11:00,Hall B
MA201,Linear Algebra,2025-01-11,13:00,Room 4
PH110,Physics Lab,2025-01-12,15:00,Lab 2
";

#[test]
fn test_csv_with_inferred_mapping() {
    let rows = csv_source::read_rows(TIMETABLE.as_bytes()).unwrap();
    assert_eq!(rows.len(), 5);

    let (mapping, events) = normalize_with_headers(&rows, "");
    assert_eq!(mapping.location, Some(4));
    let courses: Vec<&str> = events.iter().map(|e| e.course.as_str()).collect();
    assert_eq!(courses, vec!["CS101", "MA201", "PH110"]);
}

#[test]
fn test_filters_never_resurrect_empty_rows() {
    let rows = csv_source::read_rows(TIMETABLE.as_bytes()).unwrap();
    let mapping = ColumnMapping {
        course: Some(0),
        title: Some(1),
        location: Some(4),
        ..Default::default()
    };
    for filters in ["", "hall", "hall b", "lab, room"] {
        let events = normalize_rows(&rows[1..], &mapping, filters);
        assert!(events.iter().all(|e| !(e.course.is_empty() && e.title.is_empty())), "{}", filters);
    }
    let events = normalize_rows(&rows[1..], &mapping, "lab, room");
    let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Linear Algebra", "Physics Lab"]);
}
