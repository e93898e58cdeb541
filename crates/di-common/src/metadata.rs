//! 元数据定义
//!
//! 提供组件规格与实现类型的运行时描述

use std::any::TypeId;
use std::fmt;

/// 类型信息
///
/// 规格（调用方请求的抽象类型，通常是 `dyn Trait`）和实现（具体类型）
/// 在运行时都用它来标识。相等性只比较 [`TypeId`]。
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    /// 完整类型名称
    pub name: &'static str,
    /// 类型ID
    pub id: TypeId,
}

impl TypeInfo {
    /// 从类型获取类型信息
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    /// 获取简短的类型名称（不包含模块路径和 `dyn ` 前缀）
    pub fn short_name(&self) -> &'static str {
        let name = self.name.strip_prefix("dyn ").unwrap_or(self.name);
        // 泛型参数和 `+ Send` 这类约束里也会出现 `::`，只截取最外层路径
        let outer_end = name.find(['<', ' ']).unwrap_or(name.len());
        let start = name[..outer_end].rfind("::").map_or(0, |index| index + 2);
        if name[outer_end..].starts_with('<') {
            &name[start..]
        } else {
            &name[start..outer_end]
        }
    }

    /// 是否为指定类型
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl std::hash::Hash for TypeInfo {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
