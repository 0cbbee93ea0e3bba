//! Sample resource descriptors
//!
//! Courses link books through the `course_books` table. Students point at a
//! course and own phone numbers through a nullable `student` foreign key.

use std::sync::Arc;

use reinhardt_nested_writes::{FieldSpec, FieldType, ResourceDescriptor};

pub const BOOK: &str = "book";
pub const COURSE: &str = "course";
pub const STUDENT: &str = "student";
pub const PHONE: &str = "phone";

/// Through table linking courses to books
pub const COURSE_BOOKS: &str = "course_books";

/// Foreign key column on phones pointing at their student
pub const PHONE_STUDENT: &str = "student";

pub fn phone() -> Arc<ResourceDescriptor> {
	Arc::new(
		ResourceDescriptor::builder("PhoneResource", PHONE)
			.field("number", FieldSpec::plain(FieldType::string_max(15)))
			.field("type", FieldSpec::plain(FieldType::string_max(20)).optional())
			.build(),
	)
}

pub fn book() -> Arc<ResourceDescriptor> {
	Arc::new(
		ResourceDescriptor::builder("BookResource", BOOK)
			.field("title", FieldSpec::plain(FieldType::string_max(100)))
			.field("author", FieldSpec::plain(FieldType::string_max(100)))
			.build(),
	)
}

/// Course whose `books` accept child payloads
pub fn writable_course() -> Arc<ResourceDescriptor> {
	Arc::new(
		ResourceDescriptor::builder("WritableCourseResource", COURSE)
			.field("name", FieldSpec::plain(FieldType::string_max(100)))
			.field("code", FieldSpec::plain(FieldType::string_max(30)))
			.field("books", FieldSpec::write_many(book()).through(COURSE_BOOKS))
			.build(),
	)
}

/// Course whose `books` accept primary keys
pub fn replaceable_course() -> Arc<ResourceDescriptor> {
	Arc::new(
		ResourceDescriptor::builder("ReplaceableCourseResource", COURSE)
			.field("name", FieldSpec::plain(FieldType::string_max(100)))
			.field("code", FieldSpec::plain(FieldType::string_max(30)))
			.field("books", FieldSpec::ref_many(book()).through(COURSE_BOOKS))
			.build(),
	)
}

fn student(name: &str, course: FieldSpec) -> Arc<ResourceDescriptor> {
	Arc::new(
		ResourceDescriptor::builder(name, STUDENT)
			.field("name", FieldSpec::plain(FieldType::string_max(100)))
			.field("age", FieldSpec::plain(FieldType::Integer))
			.field("course", course)
			.field(
				"phone_numbers",
				FieldSpec::write_many(phone())
					.reverse_fk(PHONE_STUDENT, true)
					.read_only(),
			)
			.build(),
	)
}

/// Student whose `course` is given by primary key
pub fn replaceable_student() -> Arc<ResourceDescriptor> {
	student(
		"ReplaceableStudentResource",
		FieldSpec::ref_single(writable_course()),
	)
}

/// Student whose `course` is given as a course payload
pub fn writable_student() -> Arc<ResourceDescriptor> {
	student(
		"WritableStudentResource",
		FieldSpec::write_single(writable_course()),
	)
}
