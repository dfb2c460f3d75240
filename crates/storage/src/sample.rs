//! Built-in lessons used by the seed binary and by tests.

use chrono::{DateTime, Utc};
use lesson_core::model::{
    InteractiveContent, IntroContent, KeyFact, Lesson, LessonId, LessonMeta, PracticeContent,
    Question, QuestionId, QuizContent, RequiredInteraction, Step, StepContent, StepId,
    StringName, TheoryContent,
};

const STRINGS: [(u8, &str, &str, &str); 6] = [
    (1, "Mi agudo", "High E", "E4"),
    (2, "Si", "B", "B3"),
    (3, "Sol", "G", "G3"),
    (4, "Re", "D", "D3"),
    (5, "La", "A", "A2"),
    (6, "Mi grave", "Low E", "E2"),
];

fn step(
    lesson: LessonId,
    order: u32,
    title: &str,
    content: StepContent,
) -> Result<Step, lesson_core::Error> {
    let id = StepId::new(lesson.value() * 100 + u64::from(order));
    Ok(Step::new(id, lesson, order, title, content)?)
}

fn question(
    id: u32,
    prompt: &str,
    options: &[&str],
    correct: usize,
    explanation: &str,
) -> Question {
    Question {
        id: QuestionId::new(id),
        prompt: prompt.to_owned(),
        options: options.iter().map(|o| (*o).to_owned()).collect(),
        correct,
        explanation: explanation.to_owned(),
    }
}

/// Free introductory lesson with one step of every type.
///
/// # Errors
///
/// Returns `lesson_core::Error` if the built-in content fails validation.
pub fn meet_the_strings(
    id: LessonId,
    created_at: DateTime<Utc>,
) -> Result<Lesson, lesson_core::Error> {
    let meta = LessonMeta {
        id,
        slug: "meet-the-strings".into(),
        title: "Meet the Strings".into(),
        description: Some("Names, notes and numbering of the six guitar strings.".into()),
        lesson_number: 1,
        duration_minutes: Some(15),
        is_premium: false,
        is_published: true,
        tags: vec!["basics".into(), "strings".into()],
        learning_objectives: vec![
            "Number the strings from thinnest to thickest".into(),
            "Name the open note of each string".into(),
        ],
        created_at,
    };

    let steps = vec![
        step(
            id,
            0,
            "Welcome",
            StepContent::Intro(IntroContent {
                title: "Welcome to your first lesson".into(),
                body: "Before playing a single chord you need a map of the instrument.\nThis lesson gives you that map.".into(),
                key_points: vec![
                    "Six strings, numbered from the floor up".into(),
                    "Each open string has a fixed note".into(),
                ],
            }),
        )?,
        step(
            id,
            1,
            "String names",
            StepContent::Theory(TheoryContent {
                title: "How the strings are named".into(),
                key_facts: vec![KeyFact {
                    title: "Numbering".into(),
                    body: "String 1 is the thinnest and sits closest to the floor.\nString 6 is the thickest.".into(),
                }],
                string_names: STRINGS
                    .iter()
                    .map(|(number, name, english, note)| StringName {
                        number: *number,
                        name: (*name).to_owned(),
                        name_english: (*english).to_owned(),
                        note: (*note).to_owned(),
                    })
                    .collect(),
            }),
        )?,
        step(
            id,
            2,
            "Play the outer strings",
            StepContent::Interactive(InteractiveContent {
                title: "Find the two E strings".into(),
                instructions: "Pluck the high E, the low E and the G string on the fretboard.".into(),
                required_interactions: vec![
                    RequiredInteraction {
                        target: 0,
                        label: "Play string 1 (high E)".into(),
                    },
                    RequiredInteraction {
                        target: 5,
                        label: "Play string 6 (low E)".into(),
                    },
                    RequiredInteraction {
                        target: 2,
                        label: "Play string 3 (G)".into(),
                    },
                ],
            }),
        )?,
        step(
            id,
            3,
            "Practice",
            StepContent::Practice(PracticeContent {
                title: "Say it while you play it".into(),
                instructions: "Pick up your guitar and pluck every open string, saying its name out loud.".into(),
                tips: vec![
                    "Go slowly, accuracy first".into(),
                    "Repeat from string 6 back to string 1".into(),
                ],
                duration_minutes: Some(5),
            }),
        )?,
        step(
            id,
            4,
            "Check yourself",
            StepContent::Quiz(QuizContent {
                passing_score: 60,
                questions: vec![
                    question(
                        1,
                        "Which string is number 1?",
                        &["Low E", "High E", "A", "G"],
                        1,
                        "String 1 is the thinnest one, the high E.",
                    ),
                    question(
                        2,
                        "What note is the open 5th string?",
                        &["D", "E", "A", "B"],
                        2,
                        "The 5th string is A.",
                    ),
                    question(
                        3,
                        "Which string is the thickest?",
                        &["String 1", "String 3", "String 6", "String 4"],
                        2,
                        "String 6, the low E, is the thickest.",
                    ),
                    question(
                        4,
                        "What note is the open 3rd string?",
                        &["G", "B", "D", "E"],
                        0,
                        "The 3rd string is G.",
                    ),
                    question(
                        5,
                        "Which two strings share the same note name?",
                        &["1 and 6", "2 and 5", "3 and 4", "None"],
                        0,
                        "Strings 1 and 6 are both E, two octaves apart.",
                    ),
                ],
            }),
        )?,
    ];

    Ok(Lesson::new(meta, steps)?)
}

/// Premium follow-up lesson.
///
/// # Errors
///
/// Returns `lesson_core::Error` if the built-in content fails validation.
pub fn first_chords(id: LessonId, created_at: DateTime<Utc>) -> Result<Lesson, lesson_core::Error> {
    let meta = LessonMeta {
        id,
        slug: "first-chords".into(),
        title: "Your First Chords".into(),
        description: Some("E minor and A minor with clean fretting.".into()),
        lesson_number: 2,
        duration_minutes: Some(20),
        is_premium: true,
        is_published: true,
        tags: vec!["chords".into()],
        learning_objectives: vec!["Fret Em and Am cleanly".into()],
        created_at,
    };

    let steps = vec![
        step(
            id,
            0,
            "Chords",
            StepContent::Intro(IntroContent {
                title: "What is a chord?".into(),
                body: "Three or more notes played together.".into(),
                key_points: Vec::new(),
            }),
        )?,
        step(
            id,
            1,
            "Em",
            StepContent::Practice(PracticeContent {
                title: "E minor".into(),
                instructions: "Fret the 2nd fret of strings 5 and 4 and strum all six strings.".into(),
                tips: vec!["Use fingers 2 and 3".into()],
                duration_minutes: Some(10),
            }),
        )?,
        step(
            id,
            2,
            "Quiz",
            StepContent::Quiz(QuizContent {
                passing_score: 100,
                questions: vec![question(
                    1,
                    "How many fingers does Em need?",
                    &["One", "Two", "Three"],
                    1,
                    "Two fingers on the 2nd fret.",
                )],
            }),
        )?,
    ];

    Ok(Lesson::new(meta, steps)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::StepType;
    use lesson_core::time::fixed_now;

    #[test]
    fn starter_lesson_covers_every_step_type() {
        let lesson = meet_the_strings(LessonId::new(1), fixed_now()).unwrap();
        let types: Vec<StepType> = lesson.steps().iter().map(Step::step_type).collect();
        assert_eq!(
            types,
            vec![
                StepType::Intro,
                StepType::Theory,
                StepType::Interactive,
                StepType::Practice,
                StepType::Quiz
            ]
        );
        assert!(!lesson.is_premium());
    }

    #[test]
    fn chords_lesson_is_premium() {
        let lesson = first_chords(LessonId::new(2), fixed_now()).unwrap();
        assert!(lesson.is_premium());
        assert_eq!(lesson.total_steps(), 3);
    }
}
