use moodlog_core::Mood;

pub fn run_moods() {
    for line in format_mood_lines() {
        println!("{line}");
    }
}

pub fn format_mood_lines() -> Vec<String> {
    Mood::ALL
        .iter()
        .map(|mood| {
            let marker = if *mood == Mood::default() { "  (default)" } else { "" };
            format!("{}  {}{marker}", mood.slider_position(), mood)
        })
        .collect()
}
