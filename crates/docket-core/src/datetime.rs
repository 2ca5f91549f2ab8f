use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Duration,
  Local,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  SubsecRound,
  TimeZone,
  Utc
};
use regex::Regex;

/// Parses a due-date expression from
/// the command line: `today`,
/// `tomorrow`, `+Nd`/`+Nw`/`+Nh`
/// offsets, RFC 3339, or
/// `YYYY-MM-DD` (midnight local).
/// Results are truncated to
/// millisecond precision, the
/// resolution the wire format and the
/// local store carry.
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_due_expr(
  input: &str,
  now: DateTime<Utc>
) -> anyhow::Result<DateTime<Utc>> {
  parse_due_inner(input, now)
    .map(|dt| dt.trunc_subsecs(3))
}

fn parse_due_inner(
  input: &str,
  now: DateTime<Utc>
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => {
      let date = now
        .with_timezone(&Local)
        .date_naive();
      let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| {
          anyhow!(
            "failed to construct \
             midnight for today"
          )
        })?;
      return to_utc_from_local(
        midnight, "today"
      );
    }
    | "tomorrow" => {
      let today =
        parse_due_inner("today", now)?;
      return Ok(
        today + Duration::days(1)
      );
    }
    | _ => {}
  }

  let rel_re = Regex::new(
    r"^\+(?P<num>\d+)(?P<unit>[dwh])$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;

  if let Some(caps) =
    rel_re.captures(token)
  {
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let unit = caps
      .name("unit")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative unit")
      })?;

    let duration = match unit {
      | "d" => Duration::days(num),
      | "w" => Duration::weeks(num),
      | "h" => Duration::hours(num),
      | _ => {
        return Err(anyhow!(
          "unknown relative unit: \
           {unit}"
        ));
      }
    };

    return Ok(now + duration);
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    let midnight = date
      .and_hms_opt(0, 0, 0)
      .ok_or_else(|| {
        anyhow!(
          "failed to construct \
           midnight for date"
        )
      })?;
    return to_utc_from_local(
      midnight, "date"
    );
  }

  Err(anyhow!(
    "unrecognized due date: {input}"
  ))
  .with_context(|| {
    "supported formats: today, \
     tomorrow, +Nd/+Nw/+Nh, RFC 3339, \
     YYYY-MM-DD"
  })
}

fn to_utc_from_local(
  naive: NaiveDateTime,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  match Local
    .from_local_datetime(&naive)
  {
    | LocalResult::Single(dt) => {
      Ok(dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        first = %first,
        second = %second,
        "ambiguous local datetime; using earliest"
      );
      let chosen = if first <= second {
        first
      } else {
        second
      };
      Ok(chosen.with_timezone(&Utc))
    }
    | LocalResult::None => {
      Err(anyhow!(
        "local datetime does not \
         exist: {context}"
      ))
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    Duration,
    Local,
    TimeZone,
    Utc
  };

  use super::parse_due_expr;

  #[test]
  fn parses_relative_offsets() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 8, 25, 9, 30, 0
      )
      .single()
      .expect("valid now");

    let parsed =
      parse_due_expr("+2d", now)
        .expect("parse +2d");
    assert_eq!(
      parsed,
      now + Duration::days(2)
    );

    let parsed =
      parse_due_expr("+1w", now)
        .expect("parse +1w");
    assert_eq!(
      parsed,
      now + Duration::weeks(1)
    );

    let parsed =
      parse_due_expr("+12h", now)
        .expect("parse +12h");
    assert_eq!(
      parsed,
      now + Duration::hours(12)
    );
  }

  #[test]
  fn parses_calendar_date_as_local_midnight()
   {
    let now = Utc
      .with_ymd_and_hms(
        2026, 8, 25, 9, 30, 0
      )
      .single()
      .expect("valid now");
    let parsed =
      parse_due_expr("2026-09-01", now)
        .expect("parse date");
    let local =
      parsed.with_timezone(&Local);
    assert_eq!(
      local
        .format("%Y-%m-%d %H:%M")
        .to_string(),
      "2026-09-01 00:00"
    );
  }

  #[test]
  fn parses_rfc3339_with_offset() {
    let now = Utc::now();
    let parsed = parse_due_expr(
      "2026-08-25T11:30:00+02:00",
      now
    )
    .expect("parse rfc3339");
    let expected = Utc
      .with_ymd_and_hms(
        2026, 8, 25, 9, 30, 0
      )
      .single()
      .expect("valid expected");
    assert_eq!(parsed, expected);
  }

  #[test]
  fn rejects_unknown_expressions() {
    let now = Utc::now();
    assert!(
      parse_due_expr("someday", now)
        .is_err()
    );
    assert!(
      parse_due_expr("-3d", now)
        .is_err()
    );
  }
}

pub mod iso_millis_serde {
  use chrono::{
    DateTime,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  /// Wire format for timestamps:
  /// ISO-8601 UTC with millisecond
  /// precision, the shape the backend
  /// emits. Parsing accepts any
  /// RFC 3339 offset.
  pub const WIRE_FORMAT: &str =
    "%Y-%m-%dT%H:%M:%S%.3fZ";

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &dt
        .format(WIRE_FORMAT)
        .to_string()
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    DateTime::parse_from_rfc3339(&raw)
      .map(|dt| dt.with_timezone(&Utc))
      .map_err(
        serde::de::Error::custom
      )
  }

  pub mod option {
    use chrono::{
      DateTime,
      Utc
    };
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    pub fn serialize<S>(
      dt: &Option<DateTime<Utc>>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match dt {
        | Some(value) => {
          super::serialize(
            value, serializer
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<
      Option<DateTime<Utc>>,
      D::Error
    >
    where
      D: Deserializer<'de>
    {
      let opt =
        Option::<String>::deserialize(
          deserializer
        )?;
      match opt {
        | Some(raw) => {
          DateTime::parse_from_rfc3339(
            &raw
          )
          .map(|dt| {
            Some(dt.with_timezone(&Utc))
          })
          .map_err(
            serde::de::Error::custom
          )
        }
        | None => Ok(None)
      }
    }
  }
}
