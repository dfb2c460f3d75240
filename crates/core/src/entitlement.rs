//! Access rules derived from subscription tier and lesson premium flag.

use crate::model::{Lesson, Principal, SubscriptionTier};

/// Decides whether a principal may open a lesson.
pub trait EntitlementGate: Send + Sync {
    fn can_access(&self, lesson: &Lesson, principal: &Principal) -> bool;
}

/// Premium lessons need the premium tier; everything else is open.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriptionGate;

impl EntitlementGate for SubscriptionGate {
    fn can_access(&self, lesson: &Lesson, principal: &Principal) -> bool {
        !lesson.is_premium() || principal.subscription == SubscriptionTier::Premium
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LessonId, LessonMeta, PrincipalId};
    use crate::time::fixed_now;

    fn lesson(is_premium: bool) -> Lesson {
        Lesson::new(
            LessonMeta {
                id: LessonId::new(1),
                slug: "chords".into(),
                title: "Open chords".into(),
                description: None,
                lesson_number: 2,
                duration_minutes: None,
                is_premium,
                is_published: true,
                tags: Vec::new(),
                learning_objectives: Vec::new(),
                created_at: fixed_now(),
            },
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn free_lessons_are_open_to_everyone() {
        let gate = SubscriptionGate;
        let free = Principal::new(PrincipalId::random(), SubscriptionTier::Free);
        assert!(gate.can_access(&lesson(false), &free));
    }

    #[test]
    fn premium_lessons_need_premium_tier() {
        let gate = SubscriptionGate;
        let free = Principal::new(PrincipalId::random(), SubscriptionTier::Free);
        let premium = Principal::new(PrincipalId::random(), SubscriptionTier::Premium);
        assert!(!gate.can_access(&lesson(true), &free));
        assert!(gate.can_access(&lesson(true), &premium));
    }
}
