//! Prompt and fallback post text.
//!
//! Posts are written in Korean for a Korean readership. The prompt asks for
//! a three-section reply (`제목:`, `본문:`, `태그:`) that
//! [`crate::generator::ResponseParser`] reads back.

use crate::models::{GeneratedPost, KeywordArticle};

/// Number the non-empty body candidates as `뉴스 N:` blocks.
pub fn news_summary(body_candidates: &[String]) -> String {
    body_candidates
        .iter()
        .filter(|content| !content.trim().is_empty())
        .enumerate()
        .map(|(i, content)| format!("뉴스 {}:\n{}", i + 1, content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// User prompt for the generative call.
pub fn build_prompt(subject: &KeywordArticle, body_candidates: &[String]) -> String {
    let summary = news_summary(body_candidates);
    format!(
        r#"다음은 정책 키워드 "{keyword}"에 대한 최신 뉴스 내용입니다.
출처: {source}

{summary}

---

위 뉴스 내용을 바탕으로 마크다운 형식의 블로그 글을 작성해주세요.
뉴스 성격(정책/지원금, 사회 이슈, 트렌드, 통계, 기술)에 맞게 4단계 구조로 구성하세요.

작성 조건:
- 제목은 50자 이내의 클릭 유도형으로 작성
- 본문은 800~1200자 분량의 정보성 콘텐츠
- 마크다운 문법(##, ###, **, -, >) 활용
- 관련 태그 5개

응답 형식을 반드시 아래와 같이 지켜주세요.
제목: [제목]
본문: [마크다운 형식 본문]
태그: [태그1, 태그2, 태그3, 태그4, 태그5]
"#,
        keyword = subject.keyword,
        source = subject.source_url,
    )
}

/// Post built from the body candidates without a generative call.
pub fn fallback_post(subject: &KeywordArticle, body_candidates: &[String]) -> GeneratedPost {
    let keyword = &subject.keyword;
    let summary = news_summary(body_candidates);

    GeneratedPost {
        title: format!("{keyword} 최신 소식 - 놓치면 안 되는 핵심 정보"),
        body: format!(
            "## {keyword}에 대한 최신 뉴스\n\n\
             {keyword}에 대한 최신 뉴스를 정리해드립니다.\n\n\
             ### 주요 뉴스 내용\n\n\
             {summary}\n\n\
             ### 마무리\n\n\
             {keyword}는 현재 많은 관심을 받고 있는 키워드입니다. 앞으로도 관련 동향을 지속적으로 주시해 보겠습니다."
        ),
        tags: format!("{keyword}, 뉴스, 트렌드, 최신정보, 이슈"),
    }
}

/// Fully templated post for when there is no article text at all.
pub fn dummy_post(subject: &KeywordArticle) -> GeneratedPost {
    let keyword = &subject.keyword;

    GeneratedPost {
        title: format!("{keyword} 최신 트렌드 완전 분석! 놓치면 안 되는 핵심 정보"),
        body: format!(
            r#"## {keyword}란 무엇인가?

최근 **{keyword}**가 많은 관심을 받고 있습니다. 이번 포스팅에서는 {keyword}에 대해 자세히 알아보겠습니다.

### 1. {keyword}의 주요 특징

- 높은 검색량과 관심도
- 다양한 미디어에서의 언급 증가
- 사회적 파급효과

### 2. 왜 {keyword}가 주목받고 있을까?

소셜미디어와 뉴스에서 *{keyword}*가 언급되는 빈도가 크게 증가했습니다.

> "트렌드는 시대의 흐름을 반영합니다."

### 3. {keyword} 관련 최신 정보

1. **주요 뉴스 동향**: 관련 기사 및 보도 증가
2. **소셜미디어 반응**: 다양한 의견과 반응
3. **전문가 분석**: 해당 분야 전문가들의 견해

### 4. 마무리

{keyword}에 대한 관심이 계속 증가하고 있는 만큼, 관련 동향을 지속적으로 주시할 필요가 있습니다."#
        ),
        tags: "트렌드, 최신정보, 핫이슈, 분석, 뉴스".to_string(),
    }
}
