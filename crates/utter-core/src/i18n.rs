use crate::prefs::Language;
use crate::task::{Category, Priority};

/// Static display strings, one table per language. Pure lookup; no logic.
#[derive(Debug)]
pub struct Labels {
    pub title: &'static str,
    pub log_title: &'static str,
    pub no_tasks: &'static str,
    pub completed: &'static str,
    pub processing: &'static str,
    pub nothing_recognized: &'static str,
    pub col_id: &'static str,
    pub col_due: &'static str,
    pub col_category: &'static str,
    pub col_priority: &'static str,
    pub col_summary: &'static str,
}

static EN: Labels = Labels {
    title: "UTTER_TODO",
    log_title: "TASK_LOG",
    no_tasks: "NO_ACTIVE_TASKS",
    completed: "COMPLETED",
    processing: "PROCESSING...",
    nothing_recognized: "NO_TASKS_RECOGNIZED",
    col_id: "ID",
    col_due: "Due",
    col_category: "Category",
    col_priority: "Priority",
    col_summary: "Summary",
};

static ZH: Labels = Labels {
    title: "口述_待办",
    log_title: "任务日志",
    no_tasks: "无活动任务",
    completed: "已完成",
    processing: "处理中...",
    nothing_recognized: "未识别到任务",
    col_id: "编号",
    col_due: "截止",
    col_category: "分类",
    col_priority: "优先级",
    col_summary: "摘要",
};

pub fn labels(lang: Language) -> &'static Labels {
    match lang {
        Language::En => &EN,
        Language::Zh => &ZH,
    }
}

/// Known categories get a localized label; unknown values pass through
/// verbatim for display.
pub fn category_label(lang: Language, category: &Category) -> String {
    let known = match (lang, category) {
        (Language::En, Category::Work) => "WORK",
        (Language::En, Category::Personal) => "PERSONAL",
        (Language::En, Category::Urgent) => "URGENT",
        (Language::En, Category::Misc) => "MISC",
        (Language::Zh, Category::Work) => "工作",
        (Language::Zh, Category::Personal) => "个人",
        (Language::Zh, Category::Urgent) => "紧急",
        (Language::Zh, Category::Misc) => "杂项",
        (_, Category::Other(raw)) => return raw.clone(),
    };
    known.to_string()
}

pub fn priority_label(lang: Language, priority: Priority) -> &'static str {
    match (lang, priority) {
        (Language::En, Priority::High) => "HIGH",
        (Language::En, Priority::Medium) => "MED",
        (Language::En, Priority::Low) => "LOW",
        (Language::Zh, Priority::High) => "高",
        (Language::Zh, Priority::Medium) => "中",
        (Language::Zh, Priority::Low) => "低",
    }
}

#[cfg(test)]
mod tests {
    use super::{category_label, labels, priority_label};
    use crate::prefs::Language;
    use crate::task::{Category, Priority};

    #[test]
    fn tables_differ_by_language() {
        assert_ne!(labels(Language::En).no_tasks, labels(Language::Zh).no_tasks);
    }

    #[test]
    fn unknown_category_displays_verbatim() {
        let category = Category::Other("errands".to_string());
        assert_eq!(category_label(Language::En, &category), "errands");
        assert_eq!(category_label(Language::Zh, &category), "errands");
    }

    #[test]
    fn known_values_localize() {
        assert_eq!(category_label(Language::Zh, &Category::Work), "工作");
        assert_eq!(priority_label(Language::En, Priority::Medium), "MED");
    }
}
