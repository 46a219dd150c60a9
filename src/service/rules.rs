use gre_flags::{GreRule, Outcome};
use nfq::Verdict;

/// The configured rule and the verdicts handed back to the queue.
pub struct RuleSet {
    pub rule: GreRule,
    pub on_match: Verdict,
}

impl RuleSet {
    pub fn new(rule: GreRule, on_match: Verdict) -> Self {
        RuleSet { rule, on_match }
    }

    /// Run the rule over `payload`, rewriting it for targets.
    ///
    /// Returns the verdict and whether the payload was modified.
    pub fn get_verdict(&self, payload: &mut [u8]) -> (Verdict, bool) {
        match self.rule.process(payload) {
            Ok(Outcome::Matched) => (self.on_match.clone(), false),
            Ok(Outcome::NotMatched) => (Verdict::Accept, false),
            Ok(Outcome::Continue) => (Verdict::Accept, true),
            Ok(Outcome::Drop) => (Verdict::Drop, false),
            Err(err) => {
                error!("internal error while running '{}': {}", self.rule, err);
                (Verdict::Drop, false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gre_flags::MutationConfig;

    fn ipv4_gre(second_byte: u8) -> Vec<u8> {
        let mut packet = vec![0u8; 28];
        packet[0] = 0x45;
        packet[9] = 47;
        packet[21] = second_byte;
        packet
    }

    #[test]
    fn test_match_verdicts() {
        let rules = RuleSet::new(GreRule::Match("0x10/0x10".parse().unwrap()), Verdict::Drop);

        let mut packet = ipv4_gre(0x80);
        let (verdict, modified) = rules.get_verdict(&mut packet);
        assert!(matches!(verdict, Verdict::Drop));
        assert!(!modified);

        let mut packet = ipv4_gre(0x40);
        assert!(matches!(rules.get_verdict(&mut packet).0, Verdict::Accept));

        let mut packet = ipv4_gre(0x80);
        packet.truncate(21);
        assert!(matches!(rules.get_verdict(&mut packet).0, Verdict::Accept));
    }

    #[test]
    fn test_target_verdicts() {
        let rules = RuleSet::new(GreRule::Mutate(MutationConfig::ClearFlags), Verdict::Accept);

        let mut packet = ipv4_gre(0xFA);
        let (verdict, modified) = rules.get_verdict(&mut packet);
        assert!(matches!(verdict, Verdict::Accept));
        assert!(modified);
        assert_eq!(packet[21], 0x02);

        let mut packet = ipv4_gre(0xFA);
        packet[0] = 0x4F;
        let (verdict, modified) = rules.get_verdict(&mut packet);
        assert!(matches!(verdict, Verdict::Drop));
        assert!(!modified);
        assert_eq!(packet[21], 0xFA);
    }
}
