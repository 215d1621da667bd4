use crate::error::Error;

// Mirrors the field rules enforced at the API boundary: each failing check
// contributes one message, and every message for the input is reported at once.
struct Checks {
    messages: Vec<String>,
}

impl Checks {
    fn new() -> Self {
        Checks { messages: Vec::new() }
    }

    fn ensure(&mut self, ok: bool, message: &str) {
        if !ok {
            self.messages.push(message.to_string());
        }
    }

    fn finish(self) -> Result<(), Error> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self.messages.join(", ")))
        }
    }
}

pub fn validate_record_input(
    title: Option<&str>,
    amount: Option<f64>,
    category_id: Option<i64>,
    notes: Option<&str>,
) -> Result<(), Error> {
    let mut checks = Checks::new();
    if let Some(title) = title {
        checks.ensure(title.chars().count() >= 2, "Title must be at least 2 characters");
    }
    if let Some(amount) = amount {
        checks.ensure(amount > 0.0, "Amount must be positive");
    }
    if let Some(category_id) = category_id {
        checks.ensure(category_id > 0, "Invalid category ID");
    }
    if let Some(notes) = notes {
        checks.ensure(notes.chars().count() <= 200, "Notes too long");
    }
    checks.finish()
}

pub fn validate_category_input(name: Option<&str>, category_type: Option<&str>) -> Result<(), Error> {
    let mut checks = Checks::new();
    if let Some(name) = name {
        checks.ensure(name.chars().count() >= 2, "Name must be at least 2 characters");
    }
    if let Some(category_type) = category_type {
        checks.ensure(
            category_type == "EXPENSE" || category_type == "INCOME",
            "Invalid category type",
        );
    }
    checks.finish()
}

pub fn validate_month_year(months: &[u32], year: i32) -> Result<(), Error> {
    let mut checks = Checks::new();
    for month in months {
        checks.ensure((1..=12).contains(month), "Invalid month");
    }
    checks.ensure((2000..=2100).contains(&year), "Invalid year");
    checks.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn collects_every_field_message() {
        let err = validate_record_input(Some("x"), Some(-3.0), Some(0), None).unwrap_err();
        match err {
            Error::Validation(message) => assert_eq!(
                message,
                "Title must be at least 2 characters, Amount must be positive, Invalid category ID"
            ),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_valid_record_input() {
        assert!(validate_record_input(Some("Groceries"), Some(42.5), Some(1), Some("weekly run")).is_ok());
    }

    #[test]
    fn absent_fields_are_not_checked() {
        // Partial updates only validate what the caller sent.
        assert!(validate_record_input(None, None, None, None).is_ok());
    }

    #[test]
    fn rejects_long_notes() {
        let notes = "n".repeat(201);
        let err = validate_record_input(None, None, None, Some(&notes)).unwrap_err();
        match err {
            Error::Validation(message) => assert_eq!(message, "Notes too long"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_category_type() {
        assert!(validate_category_input(Some("Food"), Some("TRANSFER")).is_err());
        assert!(validate_category_input(Some("Food"), Some("EXPENSE")).is_ok());
    }

    #[test]
    fn bounds_month_and_year() {
        assert!(validate_month_year(&[1, 12], 2024).is_ok());
        assert!(validate_month_year(&[0], 2024).is_err());
        assert!(validate_month_year(&[13], 2024).is_err());
        assert!(validate_month_year(&[6], 1999).is_err());
        assert!(validate_month_year(&[6], 2101).is_err());
    }
}
