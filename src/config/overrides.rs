use std::fmt::Display;
use std::str::FromStr;

/// A `[<cronjob>.]<key>=<value>` override given on the command line.
///
/// Without a cronjob prefix the override applies to every cronjob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub cronjob: Option<String>,
    pub key: String,
    pub value: String,
}

impl FromStr for Override {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (target, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected '[<cronjob>.]<key>=<value>', got '{s}'"))?;
        let target = target.trim();
        let (cronjob, key) = match target.split_once('.') {
            Some((cronjob, key)) => (Some(cronjob.to_string()), key),
            None => (None, target),
        };
        if key.is_empty() || cronjob.as_deref() == Some("") {
            return Err(format!("override '{s}' has an empty key"));
        }

        Ok(Override {
            cronjob,
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

impl Display for Override {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.cronjob {
            Some(cronjob) => write!(f, "{cronjob}.{}={}", self.key, self.value),
            None => write!(f, "{}={}", self.key, self.value),
        }
    }
}
