/// Which inbound has its client panel open. At most one at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Expansion {
    #[default]
    Collapsed,
    Expanded(i64),
}

/// Effect of a [`Expansion::toggle`]: the row that closed and the row that opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub collapsed: Option<i64>,
    pub expanded: Option<i64>,
}

pub const EXPAND_ICON: &str = "+";
pub const COLLAPSE_ICON: &str = "−";

impl Expansion {
    pub fn expanded_id(&self) -> Option<i64> {
        match self {
            Expansion::Expanded(id) => Some(*id),
            Expansion::Collapsed => None,
        }
    }

    pub fn is_expanded(&self, inbound_id: i64) -> bool {
        self.expanded_id() == Some(inbound_id)
    }

    /// Expand `inbound_id`, or collapse it when it is already the open row.
    pub fn toggle(&mut self, inbound_id: i64) -> Transition {
        let previous = self.expanded_id();
        if previous == Some(inbound_id) {
            *self = Expansion::Collapsed;
            Transition {
                collapsed: previous,
                expanded: None,
            }
        } else {
            *self = Expansion::Expanded(inbound_id);
            Transition {
                collapsed: previous,
                expanded: Some(inbound_id),
            }
        }
    }

    pub fn collapse(&mut self) -> Option<i64> {
        let previous = self.expanded_id();
        *self = Expansion::Collapsed;
        previous
    }

    /// Expand/collapse control shown on the row of `inbound_id`.
    pub fn affordance(&self, inbound_id: i64) -> &'static str {
        if self.is_expanded(inbound_id) {
            COLLAPSE_ICON
        } else {
            EXPAND_ICON
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expanding_another_row_collapses_the_open_one() {
        let mut expansion = Expansion::default();
        assert_eq!(
            expansion.toggle(1),
            Transition {
                collapsed: None,
                expanded: Some(1)
            }
        );
        assert_eq!(
            expansion.toggle(2),
            Transition {
                collapsed: Some(1),
                expanded: Some(2)
            }
        );
        assert_eq!(expansion, Expansion::Expanded(2));
        assert_eq!(expansion.affordance(1), EXPAND_ICON);
        assert_eq!(expansion.affordance(2), COLLAPSE_ICON);
    }

    #[test]
    fn toggling_the_open_row_collapses_it() {
        let mut expansion = Expansion::Expanded(4);
        assert_eq!(
            expansion.toggle(4),
            Transition {
                collapsed: Some(4),
                expanded: None
            }
        );
        assert_eq!(expansion.expanded_id(), None);
    }

    #[test]
    fn only_one_row_shows_the_collapse_icon() {
        let mut expansion = Expansion::default();
        for id in [3, 1, 2, 1] {
            expansion.toggle(id);
        }
        let open: Vec<i64> = (1..=3)
            .filter(|id| expansion.affordance(*id) == COLLAPSE_ICON)
            .collect();
        assert_eq!(open, vec![1]);
        assert_eq!(expansion.collapse(), Some(1));
        assert_eq!(expansion.collapse(), None);
    }
}
