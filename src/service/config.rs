use configparser::ini::Ini;
use gre_flags::{FlagSpec, GreRule, IpVersion, MatchConfig, MutationConfig, UnknownFamily};
use nfq::Verdict;
use thiserror::Error;

use super::rules::RuleSet;

const RULE: &str = "rule";
const MATCH_FLAGS: &str = "gre-flags";
const SET_FLAGS: &str = "set-gre-flags";
const CLEAR_FLAGS: &str = "clear-gre-flags";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config file {path}: {reason}")]
    Load { path: String, reason: String },
    #[error("rule needs one of --{}, --{} or --{}", MATCH_FLAGS, SET_FLAGS, CLEAR_FLAGS)]
    MissingRule,
    #[error("options --{0} and --{1} cannot be combined")]
    Exclusive(&'static str, &'static str),
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error(transparent)]
    Family(#[from] UnknownFamily),
}

fn invalid(key: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    }
}

pub struct Config {
    config: Ini,
}

impl Config {
    pub fn load(file: &str) -> Result<Config, ConfigError> {
        let mut config = Ini::new();
        config.load(file).map_err(|reason| ConfigError::Load {
            path: file.into(),
            reason,
        })?;
        Ok(Config { config })
    }

    #[cfg(test)]
    pub fn read(text: &str) -> Result<Config, ConfigError> {
        let mut config = Ini::new();
        config
            .read(text.into())
            .map_err(|reason| ConfigError::Load {
                path: "<memory>".into(),
                reason,
            })?;
        Ok(Config { config })
    }

    pub fn get_log_level(&self) -> String {
        self.config.get("LOG", "level").unwrap_or("info".into())
    }

    pub fn get_log_file(&self) -> String {
        self.config
            .get("LOG", "file")
            .unwrap_or("/tmp/gre-flags.log".into())
    }

    pub fn get_daemon(&self) -> Result<bool, ConfigError> {
        Ok(self
            .config
            .getbool("queue", "daemon")
            .map_err(|reason| invalid("daemon", reason))?
            .unwrap_or(false))
    }

    pub fn get_queue_num(&self) -> Result<u16, ConfigError> {
        match self.config.get("queue", "num") {
            Some(num) => num.trim().parse().map_err(|err| invalid("queue num", err)),
            None => Ok(0),
        }
    }

    pub fn get_chain(&self) -> String {
        self.config
            .get(RULE, "chain")
            .unwrap_or("PREROUTING".into())
    }

    pub fn get_families(&self) -> Result<Vec<IpVersion>, ConfigError> {
        let family = self.config.get(RULE, "family").unwrap_or("all".into());
        if family.trim().eq_ignore_ascii_case("all") {
            return Ok(vec![IpVersion::V4, IpVersion::V6]);
        }
        let mut families = vec![];
        for name in family.split(',') {
            let version: IpVersion = name.parse()?;
            if !families.contains(&version) {
                families.push(version);
            }
        }
        Ok(families)
    }

    fn get_on_match(&self) -> Result<Verdict, ConfigError> {
        match self.config.get(RULE, "on-match") {
            None => Ok(Verdict::Accept),
            Some(verdict) => match verdict.trim().to_ascii_lowercase().as_str() {
                "accept" => Ok(Verdict::Accept),
                "drop" => Ok(Verdict::Drop),
                other => Err(invalid("on-match", format!("unknown verdict '{}'", other))),
            },
        }
    }

    fn get_rule(&self) -> Result<GreRule, ConfigError> {
        let matcher = self.config.get(RULE, MATCH_FLAGS);
        let set = self.config.get(RULE, SET_FLAGS);
        let clear = self
            .config
            .getbool(RULE, CLEAR_FLAGS)
            .map_err(|reason| invalid(CLEAR_FLAGS, reason))?
            .unwrap_or(false);

        match (matcher, set, clear) {
            (Some(_), Some(_), _) => Err(ConfigError::Exclusive(MATCH_FLAGS, SET_FLAGS)),
            (Some(_), None, true) => Err(ConfigError::Exclusive(MATCH_FLAGS, CLEAR_FLAGS)),
            (None, Some(_), true) => Err(ConfigError::Exclusive(SET_FLAGS, CLEAR_FLAGS)),
            (Some(spec), None, false) => {
                let cfg: MatchConfig = spec.parse().map_err(|err| invalid(MATCH_FLAGS, err))?;
                Ok(GreRule::Match(cfg))
            }
            (None, Some(spec), false) => {
                let spec: FlagSpec = spec.parse().map_err(|err| invalid(SET_FLAGS, err))?;
                Ok(GreRule::Mutate(MutationConfig::set(spec)))
            }
            (None, None, true) => Ok(GreRule::Mutate(MutationConfig::ClearFlags)),
            (None, None, false) => Err(ConfigError::MissingRule),
        }
    }

    pub fn get_rules(&self) -> Result<RuleSet, ConfigError> {
        let rule = self.get_rule()?;
        let on_match = self.get_on_match()?;
        if let GreRule::Mutate(_) = rule {
            if self.config.get(RULE, "on-match").is_some() {
                warn!("on-match is ignored for {}", rule);
            }
        }
        Ok(RuleSet::new(rule, on_match))
    }
}
