//! Nested create integration tests
//!
//! POST-style writes against the seeded library: single relations by
//! primary key and by payload, collections by primary keys and by payloads.

use http::Method;
use reinhardt_nested_writes::{
	FieldError, InMemoryStore, NestedWriteSettings, NestedWriter, Operation, PrimaryKey,
};
use reinhardt_nested_writes_testkit::fixtures::{Library, library, library_store};
use reinhardt_nested_writes_testkit::resources::{
	self, BOOK, COURSE, STUDENT, replaceable_course, replaceable_student, writable_course,
	writable_student,
};
use rstest::*;
use serde_json::json;

#[rstest]
fn test_create_with_replaceable_single_relation(library: Library) {
	// Arrange
	let student = replaceable_student();
	let payload = json!({"name": "yezy", "age": 33, "course": 2});

	// Act
	let row = library.writer().create(&student, &payload).unwrap();

	// Assert
	assert_eq!(
		library.render(&student, &row),
		json!({
			"name": "yezy",
			"age": 33,
			"course": {"name": "Programming", "code": "CS150", "books": []},
			"phone_numbers": []
		})
	);
	assert_eq!(library.store.count(COURSE), 2);
}

#[rstest]
fn test_create_with_writable_single_relation(library: Library) {
	// Arrange
	let student = writable_student();
	let payload = json!({
		"name": "yezy",
		"age": 33,
		"course": {"name": "Programming", "code": "CS50"}
	});

	// Act
	let row = library.writer().create(&student, &payload).unwrap();

	// Assert
	assert_eq!(
		library.render(&student, &row),
		json!({
			"name": "yezy",
			"age": 33,
			"course": {"name": "Programming", "code": "CS50", "books": []},
			"phone_numbers": []
		})
	);
	assert_eq!(library.store.count(COURSE), 3);
}

#[rstest]
fn test_create_with_replaceable_collection(library: Library) {
	// Arrange
	let course = replaceable_course();
	let payload = json!({"name": "Data Structures", "code": "CS310", "books": [1, 2]});

	// Act
	let row = library.writer().create(&course, &payload).unwrap();

	// Assert
	assert_eq!(
		library.render(&course, &row),
		json!({
			"name": "Data Structures",
			"code": "CS310",
			"books": [
				{"title": "Advanced Data Structures", "author": "S.Mobit"},
				{"title": "Basic Data Structures", "author": "S.Mobit"}
			]
		})
	);
	assert_eq!(library.store.count(BOOK), 2);
}

#[rstest]
fn test_create_with_writable_collection(library: Library) {
	// Arrange
	let course = writable_course();
	let payload = json!({
		"name": "Data Structures",
		"code": "CS310",
		"books": [
			{"title": "Linear Math", "author": "Me"},
			{"title": "Algebra Three", "author": "Me"}
		]
	});

	// Act
	let row = library.writer().create(&course, &payload).unwrap();

	// Assert
	assert_eq!(
		library.render(&course, &row),
		json!({
			"name": "Data Structures",
			"code": "CS310",
			"books": [
				{"title": "Linear Math", "author": "Me"},
				{"title": "Algebra Three", "author": "Me"}
			]
		})
	);
	assert_eq!(library.store.count(BOOK), 4);
}

#[rstest]
fn test_create_operations_add_and_create(library: Library) {
	// Arrange
	let course = writable_course();
	let payload = json!({
		"name": "Graphs",
		"code": "CS330",
		"books": {
			"add": [2],
			"create": [{"title": "Graph Theory", "author": "Diestel"}]
		}
	});

	// Act
	let row = library.writer().create(&course, &payload).unwrap();

	// Assert
	assert_eq!(
		library.render(&course, &row)["books"],
		json!([
			{"title": "Basic Data Structures", "author": "S.Mobit"},
			{"title": "Graph Theory", "author": "Diestel"}
		])
	);
}

#[rstest]
#[case::remove("remove")]
#[case::update("update")]
fn test_create_rejects_update_only_operations(library: Library, #[case] operation: &str) {
	// Arrange
	let course = writable_course();
	let payload = json!({
		"name": "Graphs",
		"code": "CS330",
		"books": {operation: []}
	});

	// Act
	let errors = library.writer().create(&course, &payload).unwrap_err();

	// Assert
	assert_eq!(
		errors.first(),
		Some(&FieldError::InvalidOperation {
			field: "books".to_string(),
			operation: operation.to_string(),
			allowed: vec![Operation::Add, Operation::Create],
		})
	);
	assert_eq!(library.store.write_count(), 0);
}

#[rstest]
fn test_illegal_operation_and_invalid_create_are_both_reported(library: Library) {
	// Arrange
	let course = writable_course();
	let payload = json!({
		"name": "Graphs",
		"code": "CS330",
		"books": {"delete": [1], "create": [{"title": "x"}]}
	});

	// Act
	let errors = library.writer().create(&course, &payload).unwrap_err();

	// Assert
	assert_eq!(errors.len(), 2);
	assert_eq!(
		errors.to_json(),
		json!({"books": {
			"non_field_errors": [
				"'delete' is an invalid operation, allowed operations are 'add', 'create'"
			],
			"create": {"0": {"author": ["This field is required."]}}
		}})
	);
	assert_eq!(library.store.write_count(), 0);
}

#[rstest]
fn test_create_with_unknown_reference_writes_nothing(library: Library) {
	// Arrange
	let student = replaceable_student();
	let payload = json!({"name": "yezy", "age": 33, "course": 42});

	// Act
	let errors = library.writer().create(&student, &payload).unwrap_err();

	// Assert
	assert_eq!(
		errors.to_json(),
		json!({"course": ["Invalid pk \"42\" - object does not exist."]})
	);
	assert_eq!(library.store.write_count(), 0);
	assert_eq!(library.store.count(STUDENT), 1);
}

#[rstest]
fn test_create_reports_nested_errors_with_structure(library: Library) {
	// Arrange
	let student = writable_student();
	let payload = json!({"name": "yezy", "age": "old", "course": {"name": "Programming"}});

	// Act
	let errors = library.writer().create(&student, &payload).unwrap_err();

	// Assert
	assert_eq!(
		errors.to_json(),
		json!({
			"age": ["A valid integer is required."],
			"course": {"code": ["This field is required."]}
		})
	);
	assert_eq!(library.store.write_count(), 0);
}

#[rstest]
fn test_create_requires_required_relations(library: Library) {
	let errors = library
		.writer()
		.create(&writable_student(), &json!({"name": "yezy", "age": 20}))
		.unwrap_err();

	assert_eq!(errors.to_json(), json!({"course": ["This field is required."]}));
}

#[rstest]
fn test_create_then_read_round_trip(library: Library) {
	// Arrange
	let course = writable_course();
	let payload = json!({
		"name": "Compilers",
		"code": "CS410",
		"books": [{"title": "Dragon Book", "author": "Aho"}]
	});

	// Act
	let row = library.writer().create(&course, &payload).unwrap();
	let reread = library.row(COURSE, 3);

	// Assert
	assert_eq!(row.pk, reread.pk);
	assert_eq!(library.render(&course, &reread), payload);
}

#[rstest]
fn test_post_dispatches_to_create(library: Library) {
	let course = replaceable_course();

	let row = library
		.writer()
		.write(
			&Method::POST,
			&course,
			None,
			&json!({"name": "Networks", "code": "CS440", "books": {"add": [1]}}),
		)
		.unwrap();

	assert_eq!(row.pk, PrimaryKey::Int(3));
	assert_eq!(library.course_books(3), vec![PrimaryKey::Int(1)]);
}

#[rstest]
fn test_depth_limit_applies_to_nested_payloads(library_store: InMemoryStore) {
	// Arrange
	let writer = NestedWriter::new(&library_store)
		.with_settings(NestedWriteSettings::default().with_max_depth(1));
	let payload = json!({
		"name": "yezy",
		"age": 20,
		"course": {
			"name": "Programming",
			"code": "CS50",
			"books": {"create": [{"title": "SICP", "author": "Abelson"}]}
		}
	});

	// Act
	let errors = writer
		.create(&resources::writable_student(), &payload)
		.unwrap_err();

	// Assert
	assert_eq!(
		errors.to_json(),
		json!({"course": {"books": ["Maximum nesting depth 1 exceeded"]}})
	);
	assert_eq!(library_store.write_count(), 0);
}

#[rstest]
fn test_strict_settings_from_toml_reject_unknown_keys(library_store: InMemoryStore) {
	let settings = NestedWriteSettings::from_toml_str("strict_fields = true").unwrap();
	let writer = NestedWriter::new(&library_store).with_settings(settings);

	let errors = writer
		.create(
			&replaceable_course(),
			&json!({"name": "Networks", "code": "CS440", "room": "B12"}),
		)
		.unwrap_err();

	assert_eq!(errors.to_json(), json!({"room": ["Unknown field."]}));
}
