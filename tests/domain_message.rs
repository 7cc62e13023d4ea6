//! InboundMessage 领域实体测试

use whatsapp_ai_bot::{check_eligibility, IgnoreReason, InboundMessage, SourceKind};

#[test]
fn test_direct_message() {
    let msg = InboundMessage::direct("5511999@s.whatsapp.net", "hi").with_display_name("Bob");

    assert_eq!(msg.source_kind, SourceKind::Direct);
    assert_eq!(msg.display_name(), Some("Bob"));
    assert!(check_eligibility(&msg).is_ok());
}

#[test]
fn test_source_kind_from_jid() {
    assert_eq!(SourceKind::from_jid("120363@g.us"), SourceKind::Group);
    assert_eq!(SourceKind::from_jid("status@broadcast"), SourceKind::Broadcast);
    assert_eq!(SourceKind::from_jid("5511999@s.whatsapp.net"), SourceKind::Direct);
}

#[test]
fn test_group_wins_over_empty_body() {
    // 按顺序短路，群聊先于空消息判断
    let msg = InboundMessage::direct("120363@g.us", "");
    assert_eq!(check_eligibility(&msg), Err(IgnoreReason::Group));
}
