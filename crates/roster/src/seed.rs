//! Sample records for a fresh database.

use tracing::{debug, info};

use crate::error::Result;
use crate::storage::StudentStore;
use crate::student::StudentInput;

/// The three demonstration students.
#[must_use]
pub fn sample_students() -> Vec<StudentInput> {
    vec![
        StudentInput::new(
            "John Doe",
            "john.doe@example.com",
            "CS001",
            "Computer Science",
            "3rd Year",
        )
        .with_phone("+1234567890")
        .with_address("123 Main St, City"),
        StudentInput::new(
            "Jane Smith",
            "jane.smith@example.com",
            "IT002",
            "Information Technology",
            "2nd Year",
        )
        .with_phone("+1234567891")
        .with_address("456 Oak Ave, Town"),
        StudentInput::new(
            "Mike Johnson",
            "mike.johnson@example.com",
            "EC003",
            "Electronics",
            "4th Year",
        )
        .with_phone("+1234567892")
        .with_address("789 Pine Rd, Village"),
    ]
}

/// Insert every sample student that does not collide with an existing one.
///
/// Returns how many were added.
///
/// # Errors
///
/// Returns an error if the store fails for a reason other than a conflict.
pub async fn seed(store: &dyn StudentStore) -> Result<usize> {
    let mut added = 0;
    for input in sample_students() {
        let fields = input.validate()?;
        if store
            .find_conflicting(fields.email(), fields.roll_number(), None)
            .await?
            .is_some()
        {
            debug!(roll_number = fields.roll_number(), "Sample student already present");
            continue;
        }
        match store.insert(fields).await {
            Ok(student) => {
                added += 1;
                debug!(id = %student.id, "Seeded student");
            }
            Err(err) if err.is_conflict() => {}
            Err(err) => return Err(err),
        }
    }
    info!(added, "Seeded sample students");
    Ok(added)
}
