//! Transport UI strings for the languages content is published in.

use super::source::ContentLanguage;

#[derive(Debug, PartialEq, Eq)]
pub struct TransportStrings {
    pub title: &'static str,
    pub play: &'static str,
    pub pause: &'static str,
    pub resume: &'static str,
    pub speed: &'static str,
    pub voice: &'static str,
    pub unsupported: &'static str,
}

const EN: TransportStrings = TransportStrings {
    title: "Listen to this article",
    play: "Play",
    pause: "Pause",
    resume: "Resume",
    speed: "Speed",
    voice: "Voice",
    unsupported: "Text-to-speech is not supported on this device.",
};

const AR: TransportStrings = TransportStrings {
    title: "استمع إلى هذا المقال",
    play: "تشغيل",
    pause: "إيقاف مؤقت",
    resume: "استئناف",
    speed: "السرعة",
    voice: "الصوت",
    unsupported: "تحويل النص إلى كلام غير مدعوم على هذا الجهاز.",
};

const FA: TransportStrings = TransportStrings {
    title: "این مقاله را بشنوید",
    play: "پخش",
    pause: "توقف",
    resume: "ادامه",
    speed: "سرعت",
    voice: "صدا",
    unsupported: "تبدیل متن به گفتار در این دستگاه پشتیبانی نمی‌شود.",
};

pub fn strings_for(language: ContentLanguage) -> &'static TransportStrings {
    match language {
        ContentLanguage::En => &EN,
        ContentLanguage::Ar => &AR,
        ContentLanguage::Fa => &FA,
    }
}
