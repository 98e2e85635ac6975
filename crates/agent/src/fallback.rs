//! Replies used when the agent cannot answer.

const OFFLINE_HINTS: &[(&[&str], &str)] = &[
    (
        &["streamlit"],
        "Streamlit reruns your script after every click. Keep anything you need in st.session_state.",
    ),
    (&["fastapi"], "FastAPI ships with automatic docs at /docs. Try them once the server is running!"),
    (
        &["langfuse", "monitor"],
        "Langfuse links inputs and outputs. Set the keys to see traces pop up in the dashboard.",
    ),
    (&["deploy"], "Deploy the API first, then point your Streamlit app to the live URL to share it."),
];

const OFFLINE_DEFAULT: &str =
    "I am in offline mode. Ask about Streamlit, FastAPI, or Langfuse to see directed tips.";

/// First matching keyword wins, in table order.
pub fn offline_reply(message: &str) -> &'static str {
    let text = message.to_lowercase();
    OFFLINE_HINTS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|keyword| text.contains(keyword)))
        .map(|(_, reply)| *reply)
        .unwrap_or(OFFLINE_DEFAULT)
}

pub fn starter_itinerary(destination: &str) -> String {
    format!(
        "Here's a quick starter itinerary for {destination}.\n\
         - Morning: Explore the historic downtown and visit a popular museum.\n\
         - Afternoon: Walk through a local park and sample regional cuisine.\n\
         - Evening: Find a rooftop view for sunset.\n\
         Upgrade your API keys to unlock richer MCP-powered suggestions."
    )
}
