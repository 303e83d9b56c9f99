use crate::{CounterIdx, DungeonIdx, EventIdx, FlagIdx, HelperIdx, Price, RegionIdx, SettingIdx};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CountMin {
    Fixed(u8),
    Setting(SettingIdx),
}

/// Condition gating an edge, a helper or a purchase. Evaluated against the
/// logic state for one age and time of day at a time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    Free,
    Never,
    Flag(FlagIdx),
    Counter {
        counter: CounterIdx,
        min: u8,
    },
    Event(EventIdx),
    Helper(HelperIdx),
    Setting(SettingIdx),
    OptionIs {
        setting: SettingIdx,
        value: String,
    },
    MasterQuest(DungeonIdx),
    CanAfford(Price),
    IsChild,
    IsAdult,
    AtDay,
    AtNight,
    Count {
        of: Vec<Requirement>,
        min: CountMin,
    },
    // Evaluated with the ages currently reaching `region` instead of the caller's age.
    Here {
        region: RegionIdx,
        requires: Box<Requirement>,
    },
    Not(Box<Requirement>),
    And(Vec<Requirement>),
    Or(Vec<Requirement>),
}

impl Requirement {
    pub fn make_and(reqs: Vec<Requirement>) -> Requirement {
        let mut out_reqs: Vec<Requirement> = vec![];
        for req in reqs {
            if let Requirement::Never = req {
                return Requirement::Never;
            } else if let Requirement::Free = req {
                continue;
            } else if let Requirement::And(and_reqs) = req {
                out_reqs.extend(and_reqs);
            } else {
                out_reqs.push(req);
            }
        }
        if out_reqs.len() > 1 {
            Requirement::And(out_reqs)
        } else {
            out_reqs.pop().unwrap_or(Requirement::Free)
        }
    }

    pub fn make_or(reqs: Vec<Requirement>) -> Requirement {
        let mut out_reqs: Vec<Requirement> = vec![];
        for req in reqs {
            if let Requirement::Never = req {
                continue;
            } else if let Requirement::Free = req {
                return Requirement::Free;
            } else if let Requirement::Or(or_reqs) = req {
                out_reqs.extend(or_reqs);
            } else {
                out_reqs.push(req);
            }
        }
        if out_reqs.len() > 1 {
            Requirement::Or(out_reqs)
        } else {
            out_reqs.pop().unwrap_or(Requirement::Never)
        }
    }

    /// True if evaluating this requirement reads events or region reachability.
    pub fn uses_traversal_state(&self) -> bool {
        match self {
            Requirement::Event(_) | Requirement::Here { .. } => true,
            Requirement::Not(req) => req.uses_traversal_state(),
            Requirement::And(reqs) | Requirement::Or(reqs) => {
                reqs.iter().any(|r| r.uses_traversal_state())
            }
            Requirement::Count { of, .. } => of.iter().any(|r| r.uses_traversal_state()),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_and_simplifies() {
        assert_eq!(Requirement::make_and(vec![]), Requirement::Free);
        assert_eq!(
            Requirement::make_and(vec![Requirement::Free, Requirement::Flag(3)]),
            Requirement::Flag(3)
        );
        assert_eq!(
            Requirement::make_and(vec![Requirement::Flag(1), Requirement::Never]),
            Requirement::Never
        );
        assert_eq!(
            Requirement::make_and(vec![
                Requirement::And(vec![Requirement::Flag(1), Requirement::Flag(2)]),
                Requirement::IsAdult
            ]),
            Requirement::And(vec![
                Requirement::Flag(1),
                Requirement::Flag(2),
                Requirement::IsAdult
            ])
        );
    }

    #[test]
    fn make_or_simplifies() {
        assert_eq!(Requirement::make_or(vec![]), Requirement::Never);
        assert_eq!(
            Requirement::make_or(vec![Requirement::Never, Requirement::Event(0)]),
            Requirement::Event(0)
        );
        assert_eq!(
            Requirement::make_or(vec![Requirement::Flag(1), Requirement::Free]),
            Requirement::Free
        );
    }

    #[test]
    fn traversal_state_detection() {
        let here = Requirement::Here {
            region: 0,
            requires: Box::new(Requirement::IsAdult),
        };
        assert!(here.uses_traversal_state());
        assert!(Requirement::Count {
            of: vec![Requirement::Flag(0), Requirement::Event(1)],
            min: CountMin::Fixed(1),
        }
        .uses_traversal_state());
        assert!(!Requirement::Not(Box::new(Requirement::Helper(0))).uses_traversal_state());
    }
}
