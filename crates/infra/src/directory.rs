//! [`AccessDirectory`] over the store's tables.
//!
//! Authorization runs inside the same transaction as the mutation it guards,
//! so the facts it resolves cannot change before the write commits.

use kidsbook_auth::{AccessDirectory, ResourceRef, Stewards, Stewardship};
use kidsbook_core::{GroupId, UserId};

use crate::Tables;

impl AccessDirectory for Tables {
    fn group_of(&self, target: &ResourceRef) -> Option<GroupId> {
        match *target {
            ResourceRef::Group(id) => self.group(id).ok().map(|g| g.id),
            ResourceRef::Post(id) => self.post(id).ok().map(|p| p.group),
            ResourceRef::Comment(id) => {
                let comment = self.comment(id).ok()?;
                self.post(comment.post).ok().map(|p| p.group)
            }
            ResourceRef::Survey(id) => self.survey(id).ok().map(|s| s.group),
            ResourceRef::Game(id) => self.game(id).ok().map(|g| g.group),
            ResourceRef::Global | ResourceRef::User(_) | ResourceRef::VirtualStudent(_) => None,
        }
    }

    fn is_member(&self, user: UserId, group: GroupId) -> bool {
        Tables::is_member(self, user, group)
    }

    fn stewardship_of(&self, target: &ResourceRef) -> Option<Stewardship> {
        match *target {
            ResourceRef::Global => None,
            ResourceRef::Group(id) => self.group(id).ok().map(|g| Stewardship::owned_by(g.creator)),
            ResourceRef::Post(id) => {
                let post = self.post(id).ok()?;
                let group = self.group(post.group).ok()?;
                Some(Stewardship::with_stewards(post.creator, vec![group.creator]))
            }
            ResourceRef::Comment(id) => {
                let comment = self.comment(id).ok()?;
                let post = self.post(comment.post).ok()?;
                let group = self.group(post.group).ok()?;
                Some(Stewardship::with_stewards(comment.creator, vec![group.creator]))
            }
            ResourceRef::Survey(id) => {
                let survey = self.survey(id).ok()?;
                let group = self.group(survey.group).ok()?;
                Some(Stewardship::with_stewards(survey.creator, vec![group.creator]))
            }
            ResourceRef::Game(id) => {
                let game = self.game(id).ok()?;
                let group = self.group(game.group).ok()?;
                Some(Stewardship::with_stewards(game.creator, vec![group.creator]))
            }
            ResourceRef::User(id) => self.user(id).ok().map(|u| self.profile_stewardship(u.id)),
            ResourceRef::VirtualStudent(id) => {
                let user = self.user(id).ok()?;
                if !user.role.is_virtual() {
                    return None;
                }
                user.teacher.map(Stewardship::owned_by)
            }
        }
    }
}

impl Tables {
    /// Teachers may edit students they supervise.
    ///
    /// - a Teacher's profile has no stewards
    /// - a user in no group may be edited by any teacher
    /// - otherwise: teachers sharing a group with the user, plus their own teacher
    fn profile_stewardship(&self, user: UserId) -> Stewardship {
        let Ok(row) = self.user(user) else {
            return Stewardship::owned_by(user);
        };
        if row.is_teacher() {
            return Stewardship::owned_by(user);
        }

        let groups = self.groups_of(user);
        if groups.is_empty() {
            return Stewardship {
                owner: user,
                stewards: Stewards::AnyTeacher,
            };
        }

        let mut stewards: Vec<UserId> = row.teacher.into_iter().collect();
        for group in groups {
            for member in self.members_of(group.id) {
                let is_teacher = self.user(member).is_ok_and(|m| m.is_teacher());
                if is_teacher && !stewards.contains(&member) {
                    stewards.push(member);
                }
            }
        }
        Stewardship::with_stewards(user, stewards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kidsbook_auth::{Identity, Role};
    use kidsbook_groups::{CreateGroup, Group};
    use kidsbook_identity::{RegisterUser, RegistrationKind, User};

    fn student_of(t: &mut Tables, teacher: &User, name: &str, kind: RegistrationKind) -> User {
        let user = User::register(
            RegisterUser {
                user_id: UserId::new(),
                kind,
                username: name.into(),
                email_address: format!("{name}@school.org"),
                realname: name.into(),
                description: None,
                teacher: Some(teacher.id),
                occurred_at: Utc::now(),
            },
            Some(teacher),
        )
        .unwrap();
        t.insert_user(user.clone()).unwrap();
        user
    }

    fn make_group(t: &mut Tables, teacher: &User, name: &str) -> Group {
        let group = Group::create(
            CreateGroup {
                group_id: GroupId::new(),
                name: name.into(),
                description: None,
                picture: None,
                occurred_at: Utc::now(),
            },
            &Identity::new(teacher.id, Role::Teacher),
        )
        .unwrap();
        t.insert_group(group.clone()).unwrap();
        t.insert_membership(teacher.id, group.id, Utc::now()).unwrap();
        group
    }

    #[test]
    fn teacher_profiles_have_no_stewards() {
        let mut t = Tables::default();
        let alice = User::teacher("alice", "alice@school.org", Utc::now()).unwrap();
        t.insert_user(alice.clone()).unwrap();
        let s = t.stewardship_of(&ResourceRef::User(alice.id)).unwrap();
        assert_eq!(s.stewards, Stewards::None);
    }

    #[test]
    fn ungrouped_students_are_open_to_any_teacher() {
        let mut t = Tables::default();
        let alice = User::teacher("alice", "alice@school.org", Utc::now()).unwrap();
        t.insert_user(alice.clone()).unwrap();
        let bob = student_of(&mut t, &alice, "bob", RegistrationKind::User);

        let stranger = Identity::new(UserId::new(), Role::Teacher);
        let s = t.stewardship_of(&ResourceRef::User(bob.id)).unwrap();
        assert!(s.permits(&stranger));
    }

    #[test]
    fn grouped_students_are_stewarded_by_teachers_sharing_a_group() {
        let mut t = Tables::default();
        let alice = User::teacher("alice", "alice@school.org", Utc::now()).unwrap();
        let carol = User::teacher("carol", "carol@school.org", Utc::now()).unwrap();
        t.insert_user(alice.clone()).unwrap();
        t.insert_user(carol.clone()).unwrap();
        let bob = student_of(&mut t, &alice, "bob", RegistrationKind::User);
        let math = make_group(&mut t, &carol, "Math");
        t.insert_membership(bob.id, math.id, Utc::now()).unwrap();

        let s = t.stewardship_of(&ResourceRef::User(bob.id)).unwrap();
        assert!(s.permits(&Identity::new(carol.id, Role::Teacher)));
        assert!(s.permits(&Identity::new(alice.id, Role::Teacher)));
        assert!(!s.permits(&Identity::new(UserId::new(), Role::Teacher)));
    }

    #[test]
    fn comments_resolve_to_their_posts_group() {
        use kidsbook_content::{Comment, CreateComment, CreatePost, Post};

        let mut t = Tables::default();
        let alice = User::teacher("alice", "alice@school.org", Utc::now()).unwrap();
        t.insert_user(alice.clone()).unwrap();
        let math = make_group(&mut t, &alice, "Math");
        let post = Post::create(
            CreatePost {
                content: "hi".into(),
                picture: None,
                link: None,
                ogp: None,
                is_sponsored: false,
                is_announcement: false,
            },
            math.id,
            alice.id,
            Utc::now(),
        )
        .unwrap();
        let comment = Comment::create(CreateComment { content: "yo".into() }, post.id, alice.id, Utc::now()).unwrap();
        let comment_id = comment.id;
        t.insert_post(post);
        t.insert_comment(comment);

        assert_eq!(t.group_of(&ResourceRef::Comment(comment_id)), Some(math.id));
        assert_eq!(t.group_of(&ResourceRef::Global), None);
    }

    #[test]
    fn virtual_students_are_owned_by_their_teacher() {
        let mut t = Tables::default();
        let alice = User::teacher("alice", "alice@school.org", Utc::now()).unwrap();
        t.insert_user(alice.clone()).unwrap();
        let v = student_of(&mut t, &alice, "ghost", RegistrationKind::VirtualUser);
        let s = t.stewardship_of(&ResourceRef::VirtualStudent(v.id)).unwrap();
        assert_eq!(s.owner, alice.id);

        let real = student_of(&mut t, &alice, "bob", RegistrationKind::User);
        assert!(t.stewardship_of(&ResourceRef::VirtualStudent(real.id)).is_none());
    }
}
