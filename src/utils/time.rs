use chrono::NaiveDate;


/// This is the standard way of converting a date to a session file name in sipwatch.
pub fn date_to_session_name(date: NaiveDate) -> String {
    format!("{}.json", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::date_to_session_name;

    #[test]
    fn test_session_name_format() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(date_to_session_name(date), "2025-03-07.json");
    }
}
