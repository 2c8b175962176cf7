use crate::story::{Character, Outline, StorySeed};
use std::fmt::Write;

/// Label the supervisor is asked to put in front of its score.
pub const SCORE_LABEL: &str = "分数";
pub const SUGGESTION_LABEL: &str = "建议";

fn push_characters(out: &mut String, characters: &[Character], detailed: bool) {
    for c in characters {
        let _ = writeln!(out, "\n{}（{}）：", c.name, c.role);
        if detailed {
            if let Some(age) = c.age {
                let _ = writeln!(out, "- 年龄：{}", age);
            }
            if !c.occupation.is_empty() {
                let _ = writeln!(out, "- 职业：{}", c.occupation);
            }
        }
        if !c.traits.is_empty() {
            let _ = writeln!(out, "- 性格：{}", c.traits.join("、"));
        }
        if detailed && !c.background.is_empty() {
            let _ = writeln!(out, "- 背景：{}", c.background);
        }
    }
}

fn push_list(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{}：", heading);
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
}

/// Creator prompt: asks for a story outline built from every seed element.
pub fn outline_prompt(seed: &StorySeed) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "请根据以下要素创作一个详细的故事大纲：\n");
    let _ = writeln!(out, "标题：{}", seed.title);
    let _ = writeln!(out, "主题：{}", seed.theme);
    let _ = writeln!(out, "\n场景设定：");
    let _ = writeln!(out, "- 时代背景：{}", seed.settings.time);
    let _ = writeln!(out, "- 地点：{}", seed.settings.location);
    let _ = writeln!(out, "- 季节：{}", seed.settings.season);

    if !seed.characters.is_empty() {
        let _ = writeln!(out, "\n主要人物：");
        push_characters(&mut out, &seed.characters, true);
    }

    push_list(&mut out, "冲突要素", &seed.plot_elements.conflicts);
    push_list(&mut out, "关键场景", &seed.plot_elements.key_scenes);

    let style = &seed.style_preferences;
    let _ = writeln!(out, "\n写作风格：");
    let _ = writeln!(out, "- 基调：{}", style.tone);
    let _ = writeln!(out, "- 节奏：{}", style.pacing);
    let _ = writeln!(out, "- 叙事视角：{}", style.narrative);
    if !style.focus.is_empty() {
        let _ = writeln!(out, "- 重点：{}", style.focus);
    }
    out
}

/// Human-readable rendering of an outline, embedded in writer and
/// supervisor prompts.
pub fn render_outline(outline: &Outline) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "《{}》", outline.title);
    let _ = writeln!(out, "主题：{}", outline.theme);
    let _ = writeln!(
        out,
        "背景：{}，{}，{}",
        outline.settings.time, outline.settings.location, outline.settings.season
    );
    let _ = writeln!(
        out,
        "风格：基调{}，节奏{}，{}",
        outline.style.tone, outline.style.pacing, outline.style.narrative
    );
    if !outline.style.focus.is_empty() {
        let _ = writeln!(out, "表现重点：{}", outline.style.focus);
    }

    if !outline.characters.is_empty() {
        let _ = writeln!(out, "\n人物：");
        push_characters(&mut out, &outline.characters, false);
    }

    let _ = writeln!(out, "\n章节：");
    for ch in &outline.chapters {
        if ch.key_points.is_empty() {
            let _ = writeln!(out, "- {}", ch.title);
        } else {
            let _ = writeln!(out, "- {}：{}", ch.title, ch.key_points.join("；"));
        }
    }

    if !outline.synopsis.trim().is_empty() {
        let _ = writeln!(out, "\n故事梗概：\n{}", outline.synopsis.trim());
    }
    out
}

/// Writer prompt for the first draft of an outline.
pub fn draft_prompt(outline: &Outline) -> String {
    format!(
        "请根据以下大纲创作《{}》的完整故事正文。\
        按章节顺序写作，每章以“# 第N章 标题”开头，保持人物性格前后一致。\n\n\
        大纲：\n{}",
        outline.title,
        render_outline(outline)
    )
}

/// Writer prompt for a revision driven by supervisor feedback. The outline
/// is always the run's original one.
pub fn revision_prompt(outline: &Outline, feedback: &str) -> String {
    format!(
        "审核者对上一稿《{}》给出了以下评价：\n{}\n\n\
        请根据评价重新创作完整的故事正文，严格遵循原始大纲。\n\n\
        原始大纲：\n{}",
        outline.title,
        feedback.trim(),
        render_outline(outline)
    )
}

/// Editor prompt: polish without changing the plot.
pub fn polish_prompt(draft: &str) -> String {
    format!(
        "请对以下小说草稿进行润色：优化文字表达，改进句式结构，调整段落布局，\
        增强流畅度。不要改变情节和人物设定。只输出润色后的完整正文。\n\n{}",
        draft
    )
}

/// Supervisor prompt. The reply format is what the score parser reads.
pub fn evaluation_prompt(outline: &Outline, draft: &str) -> String {
    format!(
        "请对照大纲审查《{title}》的内容，重点关注：\n\
        1. 情节连贯性：是否按照大纲发展，转折是否合理\n\
        2. 人物塑造：性格是否前后一致\n\
        3. 叙事结构：节奏是否合适，章节衔接是否自然\n\
        4. 写作风格：是否符合“{tone}”的基调与“{narrative}”的视角\n\n\
        请严格按以下格式回复：\n\
        {score}：<0到100之间的数字>\n\
        {suggestion}：<具体的修改建议>\n\
        若内容严重偏离大纲，{score}请给0。\n\n\
        大纲：\n{outline}\n\
        待审核内容：\n{draft}",
        title = outline.title,
        tone = outline.style.tone,
        narrative = outline.style.narrative,
        score = SCORE_LABEL,
        suggestion = SUGGESTION_LABEL,
        outline = render_outline(outline),
        draft = draft,
    )
}
